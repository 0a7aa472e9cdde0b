use crate::api::AppState;
use crate::api::middleware::BaseUrl;
use crate::api::schemas::password_reset::{NewPassword, ResetComplete, ResetRequest, TokenStatus};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Issues a reset token and mails the link. The token itself never appears in the response.
pub async fn request_reset(
    State(state): State<AppState>,
    BaseUrl(base_url): BaseUrl,
    Json(payload): Json<ResetRequest>,
) -> Result<impl IntoResponse> {
    state.reset_service.issue(&payload.username, &base_url).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn validate_reset(State(state): State<AppState>, Path(token): Path<String>) -> Result<impl IntoResponse> {
    state.reset_service.validate(&token).await?;
    Ok(Json(TokenStatus { valid: true }))
}

pub async fn complete_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<NewPassword>,
) -> Result<impl IntoResponse> {
    let user = state.reset_service.consume(&token, &payload.password, &payload.confirm_password).await?;
    Ok(Json(ResetComplete { username: user.username }))
}
