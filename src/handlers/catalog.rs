//! Liveness and picker-list endpoints. None of these need a session.

use axum::Json;
use serde_json::{json, Value};

use crate::language::{Language, LANGUAGES, STATES};

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "Civic-AI Backend is running",
        "message": "API is ready to serve requests",
    }))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn languages_handler() -> Json<&'static [Language]> {
    Json(LANGUAGES)
}

pub async fn states_handler() -> Json<&'static [&'static str]> {
    Json(STATES)
}
