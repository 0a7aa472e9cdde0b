use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Username already exists")]
    DuplicateIdentity,
    #[error("User not found")]
    UserNotFound,
    #[error("Password reset token is invalid or has expired")]
    InvalidOrExpiredToken,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] sqlx::Error),
    #[error("Authentication failed")]
    AuthError,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::DuplicateIdentity => {
                tracing::debug!("Duplicate identity");
                (StatusCode::CONFLICT, "Username already exists".to_string())
            }
            Self::UserNotFound => {
                tracing::debug!("User not found");
                (StatusCode::NOT_FOUND, "User not found".to_string())
            }
            Self::InvalidOrExpiredToken => {
                tracing::debug!("Reset token rejected");
                (StatusCode::BAD_REQUEST, "Password reset token is invalid or has expired".to_string())
            }
            Self::PasswordMismatch => {
                tracing::debug!("Password confirmation mismatch");
                (StatusCode::BAD_REQUEST, "Passwords do not match".to_string())
            }
            Self::DeliveryFailure(reason) => {
                tracing::error!(reason = %reason, "Mail delivery failed");
                (StatusCode::BAD_GATEWAY, "Could not deliver email".to_string())
            }
            Self::PersistenceFailure(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
