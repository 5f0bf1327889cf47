use crate::models::ModelConfig;
use anyhow::{Context, Result};
use keyring::Entry;
use std::env;

const KEYRING_SERVICE: &str = "civic_ai_llm_api_key";

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://civic_ai.sqlite?mode=rwc";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Largest document image accepted by `POST /api/ocr`.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub model: ModelConfig,
    pub ocr_command: String,
    pub cors_origins: Vec<String>,
    pub seed_example_chat: bool,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        log::info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("Environment variable '{}' must be set", key))
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Splits a comma separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The LLM endpoint settings alone; storing a key needs nothing else.
pub fn model_from_env() -> ModelConfig {
    ModelConfig {
        name: var_or("LLM_NAME", "Civic-AI"),
        api_url: var_or("LLM_API_URL", "https://api.openai.com/v1"),
        model: var_or("LLM_MODEL", "gpt-4o-mini"),
        api_key_ref: Some(var_or("LLM_API_KEY_REF", "env:OPENAI_API_KEY")),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let model = model_from_env();

        Ok(Self {
            bind_addr: var_or("CIVIC_BIND", DEFAULT_BIND),
            database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            model,
            ocr_command: var_or("OCR_COMMAND", "tesseract"),
            cors_origins: parse_origins(&var_or("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)),
            seed_example_chat: flag("CIVIC_SEED_EXAMPLE"),
        })
    }
}

// --- API Key Retrieval ---

/// Retrieves the LLM API key. The `api_key_ref` field decides whether it is
/// read from an environment variable (`env:NAME`) or the OS keyring.
pub fn get_api_key(config: &ModelConfig) -> Result<String> {
    match config.api_key_ref.as_deref() {
        Some(ref_str) if ref_str.starts_with("env:") => {
            let env_var_name = ref_str.trim_start_matches("env:");
            log::debug!("Retrieving API key from environment variable: {}", env_var_name);
            env::var(env_var_name).context(format!(
                "Failed to get API key from environment variable '{}'",
                env_var_name
            ))
        }
        Some("keyring") => {
            let entry = Entry::new(KEYRING_SERVICE, &config.name)
                .context("Failed to create keyring entry")?;
            log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
            entry.get_password().context(format!(
                "Failed to get API key from keyring for '{}'",
                config.name
            ))
        }
        Some(other) => Err(anyhow::anyhow!("Unsupported api_key_ref format: {}", other)),
        None => Err(anyhow::anyhow!(
            "API key reference not set for model config '{}'",
            config.name
        )),
    }
}

/// Stores the LLM API key in the OS keyring.
pub fn set_api_key_in_keyring(config: &ModelConfig, api_key: &str) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, &config.name)
        .context("Failed to create keyring entry for setting password")?;
    log::info!("Setting API key in keyring for service: {}", KEYRING_SERVICE);
    entry.set_password(api_key).context(format!(
        "Failed to set API key in keyring for '{}'",
        config.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(key_ref: Option<&str>) -> ModelConfig {
        ModelConfig {
            name: "test".to_string(),
            api_url: "http://localhost".to_string(),
            model: "m".to_string(),
            api_key_ref: key_ref.map(str::to_string),
        }
    }

    #[test]
    fn api_key_is_read_from_named_env_var() {
        env::set_var("CIVIC_AI_TEST_LLM_KEY", "sk-test");
        let key = get_api_key(&model(Some("env:CIVIC_AI_TEST_LLM_KEY"))).unwrap();
        assert_eq!(key, "sk-test");
    }

    #[test]
    fn unknown_key_refs_are_rejected() {
        assert!(get_api_key(&model(Some("vault:x"))).is_err());
        assert!(get_api_key(&model(None)).is_err());
        assert!(get_api_key(&model(Some("env:CIVIC_AI_TEST_UNSET_KEY"))).is_err());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
