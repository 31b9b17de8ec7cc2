use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        cookies::{clear_session_cookie, session_cookie},
        dto::{
            LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
            SendResetOtpRequest, VerifyAccountRequest,
        },
        extractors::AuthUser,
        services::AuthService,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/send-verify-otp", post(send_verify_otp))
        .route("/verify-account", post(verify_account))
        .route("/is-auth", get(is_auth))
        .route("/send-reset-otp", post(send_reset_otp))
        .route("/reset-password", post(reset_password))
}

fn session_headers(state: &AppState, token: &str) -> Result<HeaderMap, AppError> {
    let cookie = session_cookie(token, state.jwt.ttl(), state.config.production)
        .map_err(|e| AppError::Internal(e.into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let session = AuthService::from_ref(&state)
        .register(
            payload.name.as_deref().unwrap_or_default(),
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;
    let headers = session_headers(&state, &session.token)?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(MessageResponse::ok("Registration successful.")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let session = AuthService::from_ref(&state)
        .login(
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;
    let headers = session_headers(&state, &session.token)?;
    Ok((headers, Json(MessageResponse::ok("Login successful."))))
}

/// Drops the browser's cookie. The token itself stays valid until it expires.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie(state.config.production));
    (headers, Json(MessageResponse::ok("Logout successful.")))
}

#[instrument(skip(auth))]
pub async fn send_verify_otp(
    State(auth): State<AuthService>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    auth.request_email_verification(user).await?;
    Ok(Json(MessageResponse::ok(
        "Verification OTP sent to your email.",
    )))
}

#[instrument(skip(auth, payload))]
pub async fn verify_account(
    State(auth): State<AuthService>,
    user: AuthUser,
    payload: Result<Json<VerifyAccountRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    auth.confirm_email_verification(user, payload.otp.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(MessageResponse::ok("Email verified successfully.")))
}

/// Reaching this handler means the guard already accepted the session.
pub async fn is_auth(_user: AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse::bare())
}

#[instrument(skip(auth, payload))]
pub async fn send_reset_otp(
    State(auth): State<AuthService>,
    payload: Result<Json<SendResetOtpRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    auth.request_password_reset(payload.email.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(MessageResponse::ok(
        "Password reset OTP sent to your email.",
    )))
}

#[instrument(skip(auth, payload))]
pub async fn reset_password(
    State(auth): State<AuthService>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    auth.confirm_password_reset(
        payload.email.as_deref().unwrap_or_default(),
        payload.otp.as_deref().unwrap_or_default(),
        payload.new_password.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(Json(MessageResponse::ok("Password reset successful.")))
}
