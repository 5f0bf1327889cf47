//! REST access for the chat client.
//!
//! [`ChatApi`] is the seam the session manager talks through; [`HttpChatApi`]
//! is the real implementation. The session is passed in explicitly and every
//! request carries its bearer token.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::client::upload::ImageUpload;
use crate::models::{
    AuthSession, Chat, LoginRequest, Message, OcrResponse, QueryRequest, QueryResponse,
    SignUpRequest,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("This chat no longer exists.")]
    NotFound,

    #[error("Sorry, I couldn't process your request right now. Please try again in a moment.")]
    Upstream,

    #[error("Request failed (status {0}). Please try again.")]
    Status(u16),

    #[error("Unable to reach the server. Please check your internet connection and try again.")]
    Network,
}

impl ClientError {
    /// Classifies a failed response by status code. `detail` is only shown
    /// for validation failures.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            400 | 413 | 422 => ClientError::Validation(
                detail
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| "The request was not valid.".to_string()),
            ),
            401 | 403 => ClientError::SessionExpired,
            404 => ClientError::NotFound,
            500..=599 => ClientError::Upstream,
            other => ClientError::Status(other),
        }
    }

    /// Text shown in the chat bubble for this failure.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<Chat>, ClientError>;

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, ClientError>;

    async fn post_query(&self, request: &QueryRequest) -> Result<QueryResponse, ClientError>;

    /// `question` is an optional note sent along with the image.
    async fn post_ocr(
        &self,
        image: &ImageUpload,
        question: Option<&str>,
        language: &str,
        chat_id: Option<Uuid>,
    ) -> Result<OcrResponse, ClientError>;

    async fn delete_chat(&self, chat_id: Uuid) -> Result<(), ClientError>;
}

pub struct HttpChatApi {
    client: Client,
    base_url: String,
    session: AuthSession,
}

fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await.map_err(|e| {
        log::warn!("Request failed before a response arrived: {}", e);
        ClientError::Network
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("detail").and_then(|d| d.as_str()).map(str::to_string));
    log::warn!("Request failed with status {}: {:?}", status, detail);
    Err(ClientError::from_status(status.as_u16(), detail))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response.json::<T>().await.map_err(|e| {
        log::error!("Failed to decode response body: {}", e);
        ClientError::Upstream
    })
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>, session: AuthSession) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            session,
        }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Creates an account and returns its first session.
    pub async fn sign_up(base_url: &str, request: &SignUpRequest) -> Result<AuthSession, ClientError> {
        let response = send(Client::new().post(join(base_url, "/auth/signup")).json(request)).await?;
        decode(response).await
    }

    pub async fn sign_in(base_url: &str, request: &LoginRequest) -> Result<AuthSession, ClientError> {
        let response = send(Client::new().post(join(base_url, "/auth/login")).json(request)).await?;
        decode(response).await
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(join(&self.base_url, path))
            .bearer_auth(&self.session.access_token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(join(&self.base_url, path))
            .bearer_auth(&self.session.access_token)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_chats(&self) -> Result<Vec<Chat>, ClientError> {
        decode(send(self.get("/api/chats")).await?).await
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, ClientError> {
        decode(send(self.get(&format!("/api/chats/{}/messages", chat_id))).await?).await
    }

    async fn post_query(&self, request: &QueryRequest) -> Result<QueryResponse, ClientError> {
        decode(send(self.post("/api/query").json(request)).await?).await
    }

    async fn post_ocr(
        &self,
        image: &ImageUpload,
        question: Option<&str>,
        language: &str,
        chat_id: Option<Uuid>,
    ) -> Result<OcrResponse, ClientError> {
        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)
            .map_err(|_| ClientError::Validation(format!("Unsupported file type '{}'", image.mime)))?;

        let mut form = Form::new().part("file", file).text("language", language.to_string());
        if let Some(id) = chat_id {
            form = form.text("chat_id", id.to_string());
        }
        if let Some(q) = question {
            form = form.text("question", q.to_string());
        }

        decode(send(self.post("/api/ocr").multipart(form)).await?).await
    }

    async fn delete_chat(&self, chat_id: Uuid) -> Result<(), ClientError> {
        let request = self
            .client
            .delete(join(&self.base_url, &format!("/api/chats/{}", chat_id)))
            .bearer_auth(&self.session.access_token);
        let response = send(request).await?;
        if response.status() != StatusCode::NO_CONTENT {
            log::debug!("Delete returned {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_the_error_taxonomy() {
        assert_eq!(
            ClientError::from_status(400, Some("Question cannot be empty".into())),
            ClientError::Validation("Question cannot be empty".into())
        );
        assert!(matches!(ClientError::from_status(400, None), ClientError::Validation(_)));
        assert_eq!(ClientError::from_status(401, None), ClientError::SessionExpired);
        assert_eq!(ClientError::from_status(502, Some("secret".into())), ClientError::Upstream);
        assert_eq!(ClientError::from_status(429, None), ClientError::Status(429));
    }

    #[test]
    fn user_messages_never_leak_server_detail_for_upstream_errors() {
        let message = ClientError::from_status(500, Some("stack trace".into())).user_message();
        assert!(!message.contains("stack trace"));
        assert!(ClientError::SessionExpired.user_message().contains("session has expired"));
    }

    #[test]
    fn urls_join_without_double_slashes() {
        assert_eq!(join("http://localhost:8000/", "/api/chats"), "http://localhost:8000/api/chats");
    }
}
