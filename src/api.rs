use crate::language;
use crate::models::{Message, ModelConfig, Sender};
use anyhow::{Context, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

// Alias for the stream type we'll return
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One turn of the prompt sent to the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

impl From<&Message> for ChatTurn {
    fn from(msg: &Message) -> Self {
        let role = match msg.sender {
            Sender::User => "user",
            Sender::Ai => "assistant",
        };
        Self { role: role.to_string(), content: msg.content.clone() }
    }
}

// Trait defining the interface for LLM API providers
#[async_trait]
pub trait LLMApiProvider: Send + Sync {
    // Returns a stream of content deltas.
    async fn send_chat_stream_request(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[ChatTurn],
    ) -> Result<DeltaStream>;
}

/// Drains a delta stream into the full answer. A stream error or an empty
/// answer is treated as a provider failure.
pub async fn collect_response(mut stream: DeltaStream) -> Result<String> {
    let mut full_content = String::new();
    while let Some(delta) = stream.next().await {
        full_content.push_str(&delta.context("Error receiving stream delta")?);
    }
    let answer = full_content.trim();
    if answer.is_empty() {
        anyhow::bail!("Model returned an empty answer");
    }
    Ok(answer.to_string())
}

fn system_prompt(language_code: &str) -> String {
    format!(
        "You are Civic-AI, an assistant that explains Indian government schemes, \
         legal notices and public services to ordinary citizens. Use simple words \
         and short sentences. Format every answer with a '#' title, '##' section \
         headings, '-' bullet points, numbered steps for procedures and **bold** \
         for amounts, dates and deadlines. Point people to official portals and \
         warn them about middlemen. Reply only in {}.",
        language::label_for(language_code)
    )
}

/// Prompt for a free-text question, continuing the chat's earlier turns.
pub fn simplify_question(history: &[Message], question: &str, language_code: &str) -> Vec<ChatTurn> {
    let mut turns = vec![ChatTurn::system(system_prompt(language_code))];
    turns.extend(history.iter().map(ChatTurn::from));
    turns.push(ChatTurn::user(question));
    turns
}

/// Prompt asking the model to explain text read from an uploaded document.
/// `question` is the note the user typed alongside the upload, if any.
pub fn explain_document(
    history: &[Message],
    extracted_text: &str,
    question: Option<&str>,
    language_code: &str,
) -> Vec<ChatTurn> {
    let mut turns = vec![ChatTurn::system(system_prompt(language_code))];
    turns.extend(history.iter().map(ChatTurn::from));
    let mut prompt = format!(
        "I received this government document. Explain what it says, what it \
         means for me and what I should do next.\n\n---\n{}\n---",
        extracted_text.trim()
    );
    if let Some(q) = question {
        prompt.push_str(&format!("\n\nMy question about it: {}", q.trim()));
    }
    turns.push(ChatTurn::user(prompt));
    turns
}

// --- OpenAI Compatible Provider Implementation ---

#[derive(Serialize, Debug)]
struct OpenAIRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
}

// Response structure for STREAMING chunks
#[derive(Deserialize, Debug)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
}

#[derive(Deserialize, Debug, Clone)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

pub struct OpenAICompatibleProvider {
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for OpenAICompatibleProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one SSE data payload. `Ok(None)` means "nothing to emit".
fn parse_event_data(event_data: &str) -> Result<Option<String>> {
    let event_data = event_data.trim();
    if event_data == "[DONE]" {
        log::debug!("Stream finished with [DONE]");
        return Ok(None);
    }

    match serde_json::from_str::<OpenAIStreamChunk>(event_data) {
        Ok(chunk) => Ok(chunk.choices.first().and_then(|choice| choice.delta.content.clone())),
        Err(e) => match serde_json::from_str::<serde_json::Value>(event_data) {
            Ok(json_value) if json_value.get("type").and_then(|t| t.as_str()) == Some("ping") => {
                log::debug!("Received stream ping event, skipping.");
                Ok(None)
            }
            _ => {
                log::warn!("Failed to parse stream chunk: {} - Data: {}", e, event_data);
                Err(anyhow::Error::from(e).context(format!("Invalid stream chunk: {}", event_data)))
            }
        },
    }
}

#[async_trait]
impl LLMApiProvider for OpenAICompatibleProvider {
    async fn send_chat_stream_request(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[ChatTurn],
    ) -> Result<DeltaStream> {
        log::info!("Sending stream request to {} using model {}", config.api_url, config.model);

        let request_body = OpenAIRequestBody {
            model: &config.model,
            messages,
            stream: true,
        };

        let request_url = format!("{}/chat/completions", config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&request_url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send stream request to LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<Failed to read error body>".to_string());
            log::error!("LLM API stream request failed with status {}: {}", status, error_body);
            anyhow::bail!("API stream request failed with status {}", status);
        }

        let delta_stream = response
            .bytes_stream()
            .eventsource()
            .map(|event_result| -> Result<Option<String>> {
                let event = event_result.context("Error reading stream event")?;
                parse_event_data(&event.data)
            })
            .filter_map(|result| async move {
                match result {
                    Ok(Some(content)) => Some(Ok(content)),
                    Ok(None) => None,
                    Err(e) => {
                        log::error!("Error processing stream chunk: {:?}", e);
                        Some(Err(e))
                    }
                }
            });

        Ok(Box::pin(delta_stream))
    }
}
