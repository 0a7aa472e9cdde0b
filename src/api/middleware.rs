use crate::api::AppState;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

/// The caller behind a valid `Authorization: Bearer <session>` header.
#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::AuthError)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::AuthError)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::AuthError)?;

        let user_id = state.account_service.authenticate(token).await?;

        tracing::Span::current().record("user_id", tracing::field::display(user_id));
        Ok(Self { user_id, session_token: token.to_string() })
    }
}

/// Origin used when building links that are mailed out.
#[derive(Debug)]
pub struct BaseUrl(pub String);

impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(base) = &state.config.server.public_base_url {
            return Ok(Self(base.trim_end_matches('/').to_string()));
        }

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing Host header".into()))?;

        Ok(Self(format!("http://{host}")))
    }
}
