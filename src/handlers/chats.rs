//! Chat listing, history and deletion for the signed-in user.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::session::CurrentUser;
use crate::models::{Chat, Message};
use crate::state::SharedState;

fn chat_id_from(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::Validation("Invalid chat id".to_string()))
}

pub async fn list_chats_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Chat>>> {
    log::info!("Listing chats for user {}", user.id);
    Ok(Json(state.storage.list_chats(user.id).await?))
}

pub async fn list_messages_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<Vec<Message>>> {
    let chat_id = chat_id_from(path)?;
    state
        .storage
        .get_chat(user.id, chat_id)
        .await?
        .ok_or(AppError::NotFound("Chat"))?;
    Ok(Json(state.storage.list_messages(chat_id).await?))
}

pub async fn delete_chat_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let chat_id = chat_id_from(path)?;
    if state.storage.delete_chat(user.id, chat_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Chat"))
    }
}
