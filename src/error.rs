use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::AuthError;

pub const UPSTREAM_FAILURE_MESSAGE: &str =
    "Sorry, we could not process your request right now. Please try again in a moment.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Your session has expired. Please sign in again.")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Upstream service failure: {0:#}")]
    Upstream(anyhow::Error),

    #[error("Internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken => AppError::Unauthorized,
            AuthError::InvalidCredentials | AuthError::AlreadyRegistered => {
                AppError::Validation(e.to_string())
            }
            AuthError::Rejected(detail) => AppError::Validation(detail),
            AuthError::Upstream(inner) => AppError::Upstream(inner),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show the caller. Provider and internal details stay in
    /// the logs.
    pub fn detail(&self) -> String {
        match self {
            AppError::Upstream(_) | AppError::Internal(_) => UPSTREAM_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upstream(_) | AppError::Internal(_) => log::error!("{}", self),
            AppError::Validation(_) => log::warn!("Rejected request: {}", self),
            _ => log::debug!("{}", self),
        }
        let body = serde_json::json!({ "detail": self.detail() });
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_details_are_not_leaked() {
        let err = AppError::Upstream(anyhow::anyhow!("sk-secret rejected by provider"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.detail(), UPSTREAM_FAILURE_MESSAGE);
    }

    #[test]
    fn validation_detail_is_surfaced() {
        let err = AppError::Validation("Question cannot be empty".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Question cannot be empty");
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        assert_eq!(AppError::from(AuthError::InvalidToken).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AuthError::AlreadyRegistered).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(AuthError::Upstream(anyhow::anyhow!("down"))).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
