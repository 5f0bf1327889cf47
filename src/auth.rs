//! Account management delegated to the hosted auth provider (Supabase Auth).

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuthSession, User};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AlreadyRegistered,

    #[error("Session is missing, invalid or expired")]
    InvalidToken,

    #[error("{0}")]
    Rejected(String),

    #[error("Auth provider failure: {0:#}")]
    Upstream(anyhow::Error),
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Upstream(e)
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates a confirmed account and signs it in.
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Resolves an access token to its user.
    async fn get_user(&self, access_token: &str) -> Result<User, AuthError>;
}

#[derive(Deserialize, Debug)]
struct SupabaseUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl From<SupabaseUser> for User {
    fn from(u: SupabaseUser) -> Self {
        let name = u
            .user_metadata
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        User {
            id: u.id,
            email: u.email.unwrap_or_default(),
            name,
        }
    }
}

#[derive(Deserialize, Debug)]
struct SupabaseSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    user: SupabaseUser,
}

/// GoTrue reports errors under a handful of different keys depending on the
/// endpoint and version.
fn error_detail(body: &serde_json::Value) -> String {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("request rejected by auth provider")
        .to_string()
}

pub struct SupabaseAuthProvider {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseAuthProvider {
    pub fn new(base_url: &str, anon_key: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn with_anon_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.anon_key)
    }

    fn with_service_role(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn read_error(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let body = response.json::<serde_json::Value>().await.unwrap_or_default();
        (status, error_detail(&body))
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        log::info!("Creating confirmed account for {}", email);
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "email_confirm": true,
            "user_metadata": { "name": name },
        });

        let response = self
            .with_service_role(self.client.post(self.url("/admin/users")))
            .json(&body)
            .send()
            .await
            .context("Failed to reach auth provider")?;

        if !response.status().is_success() {
            let (status, detail) = Self::read_error(response).await;
            log::warn!("Sign-up for {} rejected with {}: {}", email, status, detail);
            let lowered = detail.to_lowercase();
            if lowered.contains("already") || lowered.contains("exists") {
                return Err(AuthError::AlreadyRegistered);
            }
            if status.is_client_error() {
                return Err(AuthError::Rejected(detail));
            }
            return Err(AuthError::Upstream(anyhow::anyhow!("sign-up failed with status {}", status)));
        }

        self.sign_in(email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .with_anon_key(self.client.post(self.url("/token?grant_type=password")))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("Failed to reach auth provider")?;

        match response.status() {
            status if status.is_success() => {
                let session: SupabaseSession = response
                    .json()
                    .await
                    .context("Failed to decode auth session")?;
                Ok(AuthSession {
                    access_token: session.access_token,
                    refresh_token: session.refresh_token,
                    token_type: session.token_type.unwrap_or_else(|| "bearer".to_string()),
                    expires_in: session.expires_in,
                    user: session.user.into(),
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(AuthError::InvalidCredentials),
            _ => {
                let (status, detail) = Self::read_error(response).await;
                Err(AuthError::Upstream(anyhow::anyhow!(
                    "sign-in failed with status {}: {}",
                    status,
                    detail
                )))
            }
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .with_anon_key(self.client.get(self.url("/user")))
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to reach auth provider")?;

        match response.status() {
            status if status.is_success() => {
                let user: SupabaseUser = response.json().await.context("Failed to decode user")?;
                Ok(user.into())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => Err(AuthError::Upstream(anyhow::anyhow!(
                "user lookup failed with status {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_reads_any_gotrue_shape() {
        let v = serde_json::json!({ "code": 422, "msg": "A user with this email address has already been registered" });
        assert!(error_detail(&v).contains("already been registered"));
        let v = serde_json::json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" });
        assert_eq!(error_detail(&v), "Invalid login credentials");
        assert_eq!(error_detail(&serde_json::Value::Null), "request rejected by auth provider");
    }

    #[test]
    fn user_name_comes_from_metadata() {
        let raw = serde_json::json!({
            "id": "6f1c2a4e-8b6d-4a55-9a35-2f7f5a1c9b10",
            "email": "meena@example.in",
            "user_metadata": { "name": "Meena" }
        });
        let user: User = serde_json::from_value::<SupabaseUser>(raw).unwrap().into();
        assert_eq!(user.name, "Meena");
        assert_eq!(user.email, "meena@example.in");
    }

    #[test]
    fn urls_are_rooted_at_auth_v1() {
        let provider = SupabaseAuthProvider::new("https://abc.supabase.co/", "anon", "service");
        assert_eq!(provider.url("/user"), "https://abc.supabase.co/auth/v1/user");
    }
}
