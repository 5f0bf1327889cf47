//! Steps shared by the query and OCR endpoints: resolve or open the chat,
//! record the user turn, ask the model, record the answer.

use uuid::Uuid;

use crate::api::{collect_response, ChatTurn};
use crate::error::{AppError, AppResult};
use crate::language;
use crate::models::{Chat, Message, Sender, User};
use crate::state::AppState;

/// Normalises a language code, rejecting ones we have no label for.
pub fn resolve_language(code: &str) -> AppResult<&'static str> {
    language::find(code)
        .map(|l| l.code)
        .ok_or_else(|| AppError::Validation(format!("Unsupported language '{}'", code.trim())))
}

/// Returns the caller's chat, or creates one titled from `first_input` when
/// no id was given.
pub async fn open_chat(state: &AppState, user: &User, chat_id: Option<Uuid>, first_input: &str) -> AppResult<Chat> {
    match chat_id {
        Some(id) => state
            .storage
            .get_chat(user.id, id)
            .await?
            .ok_or(AppError::NotFound("Chat")),
        None => {
            // Accounts created outside /auth/signup have no profile row yet.
            state.storage.upsert_user(user).await?;
            Ok(state.storage.create_chat(user.id, first_input).await?)
        }
    }
}

/// Stores the user's turn and returns the history that preceded it.
pub async fn record_user_turn(state: &AppState, chat: &Chat, content: &str) -> AppResult<Vec<Message>> {
    let history = state.storage.list_messages(chat.id).await?;
    let message = Message::new(Sender::User, content);
    state.storage.save_message(chat.id, &message).await?;
    Ok(history)
}

/// Runs the prompt through the model. Any provider failure is upstream.
pub async fn ask_model(state: &AppState, turns: &[ChatTurn]) -> AppResult<String> {
    let stream = state
        .api_provider
        .send_chat_stream_request(&state.model_config, &state.api_key, turns)
        .await
        .map_err(AppError::Upstream)?;
    collect_response(stream).await.map_err(AppError::Upstream)
}

pub async fn record_ai_turn(state: &AppState, chat: &Chat, answer: &str) -> AppResult<()> {
    let message = Message::new(Sender::Ai, answer);
    state.storage.save_message(chat.id, &message).await?;
    Ok(())
}

/// Parses an optional chat id sent as a form field.
pub fn parse_chat_id(raw: Option<&str>) -> AppResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "null") {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Invalid chat id '{}'", s))),
    }
}
