//! Sign-up and log-in, delegated to the auth provider.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::models::{AuthSession, LoginRequest, SignUpRequest};
use crate::state::SharedState;

const MIN_PASSWORD_LEN: usize = 6;

fn validate_email(email: &str) -> AppResult<()> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(AppError::Validation("Please enter a valid email address".to_string()))
    }
}

pub fn validate_sign_up(req: &SignUpRequest) -> AppResult<()> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_email(req.email.trim())?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub async fn sign_up_handler(
    State(state): State<SharedState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthSession>)> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    validate_sign_up(&req)?;

    let email = req.email.trim().to_lowercase();
    log::info!("Sign-up requested for {}", email);
    let session = state
        .auth_provider
        .sign_up(req.name.trim(), &email, &req.password)
        .await?;

    // Profile rows are written with the service role, bypassing row-level security.
    let mut profile = session.user.clone();
    if profile.name.is_empty() {
        profile.name = req.name.trim().to_string();
    }
    state.storage.upsert_user(&profile).await?;

    if state.seed_example_chat {
        if let Err(e) = state.storage.seed_example_chat(profile.id).await {
            log::error!("Failed to seed example chat for {}: {:?}", profile.id, e);
        }
    }

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login_handler(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthSession>> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;
    if req.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    log::info!("Log-in requested for {}", email);
    let session = state.auth_provider.sign_in(&email, &req.password).await?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn sign_up_fields_are_validated() {
        assert!(validate_sign_up(&request("Asha", "asha@example.in", "secret1")).is_ok());
        assert!(validate_sign_up(&request(" ", "asha@example.in", "secret1")).is_err());
        assert!(validate_sign_up(&request("Asha", "asha.example.in", "secret1")).is_err());
        assert!(validate_sign_up(&request("Asha", "asha@example", "secret1")).is_err());
        assert!(validate_sign_up(&request("Asha", "asha@example.in", "123")).is_err());
    }
}
