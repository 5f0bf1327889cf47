//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::MAX_UPLOAD_BYTES;
use crate::handlers;
use crate::state::SharedState;

/// Room for multipart boundaries and the small text fields next to the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Build the complete router with every API route.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::catalog::root_handler))
        .route("/api/health", get(handlers::catalog::health_handler))
        .route("/api/languages", get(handlers::catalog::languages_handler))
        .route("/api/states", get(handlers::catalog::states_handler))
        // Accounts
        .route("/auth/signup", post(handlers::auth::sign_up_handler))
        .route("/auth/login", post(handlers::auth::login_handler))
        // Chats
        .route("/api/chats", get(handlers::chats::list_chats_handler))
        .route("/api/chats/:chat_id", delete(handlers::chats::delete_chat_handler))
        .route(
            "/api/chats/:chat_id/messages",
            get(handlers::chats::list_messages_handler),
        )
        // AI
        .route("/api/query", post(handlers::query::query_handler))
        .route(
            "/api/ocr",
            post(handlers::ocr::ocr_handler)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .with_state(state)
}
