use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::{AuthSession as AuthSessionSchema, Login, RegisteredUser, Registration};
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse> {
    let user = state.account_service.register(&payload.username, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(RegisteredUser { id: user.id, username: user.username })))
}

pub async fn login(State(state): State<AppState>, Json(payload): Json<Login>) -> Result<impl IntoResponse> {
    let session = state.account_service.login(&payload.username, &payload.password).await?;
    Ok(Json(AuthSessionSchema { token: session.token, expires_at: session.expires_at }))
}

pub async fn logout(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.account_service.logout(auth_user.user_id, &auth_user.session_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
