//! Account flows: registration, login, confirmation and password reset.
//!
//! There is no mail transport. Every token that would be mailed is logged,
//! and echoed back in the response when `expose_tokens` is set.

use crate::{
    accounts::{self, NewUser},
    auth::{TokenSigner, password},
    config::AppConfig,
    error::AppError,
    extractors::LoggedInUser,
    routes::users::UserResponse,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Serialize)]
pub struct TokenIssued {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl TokenIssued {
    pub fn new(config: &AppConfig, user_id: i64, message: &'static str, token: String) -> Self {
        tracing::info!(user_id, %token, "{message}");
        Self {
            message,
            token: config.expose_tokens.then_some(token),
        }
    }
}

#[derive(Serialize)]
pub struct Message {
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    user: UserResponse,
    confirmation: TokenIssued,
}

pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    State(tokens): State<TokenSigner>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(payload.email.as_str());

    let user = accounts::create_user(
        &pool,
        &config,
        NewUser {
            email: &payload.email,
            username,
            password: &payload.password,
        },
    )
    .await?;

    let token = user.generate_confirmation_token(&tokens, config.token_expiration)?;
    let confirmation = TokenIssued::new(&config, user.id, "confirmation token issued", token);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::load(&pool, &user).await?,
            confirmation,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    expiration: i64,
    confirmed: bool,
}

pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    State(tokens): State<TokenSigner>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let mut user = accounts::find_by_email(&pool, &payload.email)
        .await?
        .filter(|user| user.verify_password(&payload.password))
        .ok_or(AppError::Unauthorized)?;
    user.ping(&pool).await?;

    tracing::info!(user_id = user.id, "logged in");
    Ok(Json(LoginResponse {
        token: user.generate_auth_token(&tokens, config.token_expiration)?,
        expiration: config.token_expiration,
        confirmed: user.confirmed,
    }))
}

pub async fn logout(caller: LoggedInUser) -> StatusCode {
    tracing::info!(user_id = caller.user.id, "logged out");
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    confirmed: bool,
}

pub async fn confirm(
    State(pool): State<SqlitePool>,
    State(tokens): State<TokenSigner>,
    caller: LoggedInUser,
    Path(token): Path<String>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let mut user = caller.user;
    if user.confirmed || user.confirm(&pool, &tokens, &token).await? {
        return Ok(Json(ConfirmResponse { confirmed: true }));
    }
    Err(AppError::bad_request(
        "The confirmation link is invalid or has expired",
    ))
}

pub async fn resend_confirmation(
    State(config): State<AppConfig>,
    State(tokens): State<TokenSigner>,
    caller: LoggedInUser,
) -> Result<(StatusCode, Json<TokenIssued>), AppError> {
    let user = caller.user;
    let token = user.generate_confirmation_token(&tokens, config.token_expiration)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TokenIssued::new(
            &config,
            user.id,
            "confirmation token issued",
            token,
        )),
    ))
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Always 202, whether or not the address belongs to an account.
pub async fn request_password_reset(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    State(tokens): State<TokenSigner>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenIssued>), AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let message = "if the address is registered, a reset token has been issued";

    let response = match accounts::find_by_email(&pool, &payload.email).await? {
        Some(user) => {
            let token = user.generate_reset_password_token(&tokens, config.token_expiration)?;
            TokenIssued::new(&config, user.id, message, token)
        }
        None => {
            tracing::debug!("password reset requested for unknown address");
            TokenIssued {
                message,
                token: None,
            }
        }
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub password: String,
}

pub async fn reset_password(
    State(pool): State<SqlitePool>,
    State(tokens): State<TokenSigner>,
    Path(token): Path<String>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    password::validate_password(&payload.password)?;

    let invalid = || AppError::bad_request("The reset link is invalid or has expired");
    let mut user = accounts::find_by_email(&pool, &payload.email)
        .await?
        .ok_or_else(invalid)?;

    if !user
        .reset_password(&pool, &tokens, &token, &payload.password)
        .await?
    {
        return Err(invalid());
    }
    Ok(Json(Message {
        message: "Your password has been updated",
    }))
}
