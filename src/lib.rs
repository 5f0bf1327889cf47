//! Civic-AI: explains government documents and schemes in plain language.
//!
//! The backend (`run`) exposes a small REST API over chats and messages,
//! forwarding questions to an LLM and document images to OCR. The `client`
//! module holds the chat-session manager used by front ends.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod language;
pub mod models;
pub mod ocr;
pub mod router;
pub mod seed;
pub mod state;
pub mod storage;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::api::{LLMApiProvider, OpenAICompatibleProvider};
use crate::auth::{AuthProvider, SupabaseAuthProvider};
use crate::config::Config;
use crate::ocr::{OcrProvider, TesseractOcr};
use crate::state::AppState;
use crate::storage::StorageManager;

/// Entry point: load configuration, connect storage and providers, serve.
pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    log::info!("Civic-AI starting");

    let storage = StorageManager::connect(&config.database_url).await?;
    let api_key = config::get_api_key(&config.model)?;

    let api_provider: Arc<dyn LLMApiProvider> = Arc::new(OpenAICompatibleProvider::new());
    let ocr_provider: Arc<dyn OcrProvider> = Arc::new(TesseractOcr::new(config.ocr_command.clone()));
    let auth_provider: Arc<dyn AuthProvider> = Arc::new(SupabaseAuthProvider::new(
        &config.supabase_url,
        config.supabase_anon_key.clone(),
        config.supabase_service_role_key.clone(),
    ));

    let state = AppState::new(
        storage,
        api_provider,
        ocr_provider,
        auth_provider,
        config.model.clone(),
        api_key,
    )
    .with_seed_example_chat(config.seed_example_chat)
    .shared();

    let app = router::build_router(state).layer(router::cors_layer(&config.cors_origins));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    log::info!("Civic-AI listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("Civic-AI shut down");
    Ok(())
}

/// Saves the LLM API key in the OS keyring under the configured model name,
/// for use with `LLM_API_KEY_REF=keyring`.
pub fn store_api_key(api_key: &str) -> anyhow::Result<()> {
    let model = config::model_from_env();
    config::set_api_key_in_keyring(&model, api_key.trim())?;
    log::info!("Stored API key for '{}'", model.name);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
