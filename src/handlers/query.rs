//! `POST /api/query`: free-text questions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api;
use crate::error::{AppError, AppResult};
use crate::handlers::chat_flow::{ask_model, open_chat, record_ai_turn, record_user_turn, resolve_language};
use crate::handlers::session::CurrentUser;
use crate::models::{QueryRequest, QueryResponse};
use crate::state::SharedState;

pub async fn query_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> AppResult<Json<QueryResponse>> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question cannot be empty".to_string()));
    }
    let language = resolve_language(&req.language)?;

    let chat = open_chat(&state, &user, req.chat_id, question).await?;
    log::info!("Query from user {} in chat {} ({})", user.id, chat.id, language);

    let history = record_user_turn(&state, &chat, question).await?;
    let turns = api::simplify_question(&history, question, language);
    let answer = ask_model(&state, &turns).await?;
    record_ai_turn(&state, &chat, &answer).await?;

    Ok(Json(QueryResponse {
        answer,
        chat_id: chat.id,
        language: language.to_string(),
    }))
}
