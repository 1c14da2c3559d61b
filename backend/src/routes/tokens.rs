use crate::{
    auth::TokenSigner, config::AppConfig, error::AppError, extractors::ApiUser,
};
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expiration: i64,
}

/// Mints a bearer token for a caller who proved themselves with a password.
/// Anonymous callers and callers already holding a token are refused.
pub async fn get_token(
    State(tokens): State<TokenSigner>,
    State(config): State<AppConfig>,
    caller: ApiUser,
) -> Result<Json<TokenResponse>, AppError> {
    if caller.current.is_anonymous() || caller.token_used {
        return Err(AppError::Unauthorized);
    }
    let user = caller.current.user().ok_or(AppError::Unauthorized)?;

    let token = user.generate_auth_token(&tokens, config.token_expiration)?;
    Ok(Json(TokenResponse {
        token,
        expiration: config.token_expiration,
    }))
}
