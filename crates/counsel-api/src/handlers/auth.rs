//! Account routes under `/auth`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

fn required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let email = req.email.trim();
    state
        .accounts
        .register(email, &req.password, &req.confirm_password)
        .await?;
    Ok((
        StatusCode::CREATED,
        message("Registration received. Check your email for the verification code."),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<Value>, ApiError> {
    required(&req.email, "email")?;
    required(&req.code, "code")?;
    state.accounts.verify_email(req.email.trim(), &req.code).await?;
    Ok(message("Email verified"))
}

pub async fn verify_email_status(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Value>, ApiError> {
    let email = query.email.unwrap_or_default();
    required(&email, "email")?;
    let verified = state.accounts.verification_status(email.trim()).await?;
    Ok(Json(json!({ "verified": verified })))
}

pub async fn verify_email_request(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    state.accounts.request_verification(req.email.trim()).await?;
    Ok(message("Verification email sent"))
}

pub async fn resend_verification_code(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    state.accounts.send_code(req.email.trim()).await?;
    Ok(message("Verification code sent"))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    required(&req.email, "email")?;
    required(&req.password, "password")?;
    let pair = state.accounts.login(req.email.trim(), &req.password).await?;
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    required(&req.refresh_token, "refresh_token")?;
    let access_token = state.accounts.refresh(req.refresh_token.trim()).await?;
    Ok(Json(json!({ "access_token": access_token })))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<Value>, ApiError> {
    required(&req.access_token, "access_token")?;
    state.accounts.logout(req.access_token.trim()).await?;
    Ok(message("Logged out"))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    required(&req.email, "email")?;
    state
        .accounts
        .request_password_reset(req.email.trim())
        .await?;
    Ok(message("Password reset link sent"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .accounts
        .reset_password(
            req.token.trim(),
            req.email.trim(),
            &req.new_password,
            &req.confirm_password,
        )
        .await?;
    Ok(message("Password changed"))
}

pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    state.accounts.delete_account(auth.user_id).await?;
    Ok(message("Account deleted"))
}
