//! Account and session handlers

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{MessageResponse, UserResponse};
use crate::AppState;
use papervault_common::{
    auth::{request_token, RequireUser},
    errors::{AppError, Result},
    services::Registration,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// Same value as the session cookie, for clients using `Bearer`
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

/// `Set-Cookie` value for the session cookie
pub fn session_cookie(state: &AppState, token: &str, max_age_secs: u64) -> Result<HeaderValue> {
    let secure = if state.config.server.secure_cookies { "; Secure" } else { "" };
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        state.config.auth.session_cookie, token, max_age_secs, secure
    );

    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal {
        message: format!("invalid session cookie: {}", e),
    })
}

/// Create an account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<Registration>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state.services.accounts.register(request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Check credentials and open a session
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (user, session) = state
        .services
        .identity
        .login(&request.email, &request.password, request.remember)
        .await?;

    let cookie = session_cookie(&state, &session.token, session.max_age_secs)?;

    tracing::info!(user_id = user.id, remember = request.remember, "User logged in");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            user: user.into(),
            token: session.token,
            expires_at: session.expires_at.to_rfc3339(),
        }),
    ))
}

/// End the current session; succeeds without one
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    if let Some(token) = request_token(&headers, state.services.identity.cookie_name()) {
        state.services.identity.logout(token).await?;
    }

    let cookie = session_cookie(&state, "", 0)?;
    Ok((StatusCode::NO_CONTENT, AppendHeaders([(header::SET_COOKIE, cookie)])))
}

/// Start a password reset. The answer is the same whether or not the
/// address is registered.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state
        .services
        .accounts
        .request_password_reset(&request.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If the address is registered, a reset link has been sent",
        )),
    ))
}

/// Finish a password reset
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetConfirmRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .services
        .accounts
        .complete_password_reset(&request.token, &request.password)
        .await?;

    Ok(Json(MessageResponse::new("Password updated, please log in again")))
}

/// The logged-in account
pub async fn me(RequireUser(user): RequireUser) -> Json<UserResponse> {
    Json(user.into())
}
