use crate::{
    accounts,
    auth::TokenSigner,
    config::AppConfig,
    error::AppError,
    extractors::LoggedInUser,
    routes::{
        auth::{Message, TokenIssued},
        users::UserResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

const MAX_USERNAME_LEN: usize = 64;

#[derive(Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

pub async fn change_username(
    State(pool): State<SqlitePool>,
    caller: LoggedInUser,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let mut user = caller.user;

    let username = payload.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request(format!(
            "username must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }

    if username != user.username {
        if accounts::username_taken(&pool, username).await? {
            return Err(AppError::conflict("username already taken"));
        }
        sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(user.id)
            .execute(&pool)
            .await?;
        user.username = username.to_string();
    }

    Ok(Json(UserResponse::load(&pool, &user).await?))
}

#[derive(Deserialize)]
pub struct IntroductionRequest {
    pub introduction: Option<String>,
}

pub async fn change_introduction(
    State(pool): State<SqlitePool>,
    caller: LoggedInUser,
    payload: Result<Json<IntroductionRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let mut user = caller.user;

    let introduction = payload
        .introduction
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty());
    sqlx::query("UPDATE users SET introduction = ? WHERE id = ?")
        .bind(&introduction)
        .bind(user.id)
        .execute(&pool)
        .await?;
    user.introduction = introduction;

    Ok(Json(UserResponse::load(&pool, &user).await?))
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub old_password: String,
    pub password: String,
}

pub async fn change_password(
    State(pool): State<SqlitePool>,
    caller: LoggedInUser,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let mut user = caller.user;

    if !user.verify_password(&payload.old_password) {
        return Err(AppError::bad_request("Invalid password"));
    }
    user.set_password(&pool, &payload.password).await?;

    tracing::info!(user_id = user.id, "password changed");
    Ok(Json(Message {
        message: "Your password has been updated",
    }))
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

pub async fn request_email_change(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    State(tokens): State<TokenSigner>,
    caller: LoggedInUser,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenIssued>), AppError> {
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let user = caller.user;

    let email = accounts::normalize_email(&payload.email);
    accounts::validate_email(&email)?;
    if accounts::email_taken(&pool, &email).await? {
        return Err(AppError::conflict("email already registered"));
    }

    let token = user.generate_change_email_token(&tokens, &email, config.token_expiration)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TokenIssued::new(
            &config,
            user.id,
            "change-email token issued",
            token,
        )),
    ))
}

#[derive(Serialize)]
pub struct EmailResponse {
    email: String,
}

pub async fn change_email(
    State(pool): State<SqlitePool>,
    State(tokens): State<TokenSigner>,
    caller: LoggedInUser,
    Path(token): Path<String>,
) -> Result<Json<EmailResponse>, AppError> {
    let mut user = caller.user;
    if !user.change_email(&pool, &tokens, &token).await? {
        return Err(AppError::bad_request("Invalid request"));
    }
    Ok(Json(EmailResponse { email: user.email }))
}
