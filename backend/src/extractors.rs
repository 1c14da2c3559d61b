use crate::accounts;
use crate::auth::{CurrentUser, TokenSigner};
use crate::error::AppError;
use crate::models::User;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic {
        email_or_token: String,
        password: String,
    },
    Bearer(String),
}

/// Parses `Authorization: Basic ...` or `Authorization: Bearer ...`.
pub fn credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, rest) = value.trim().split_once(' ')?;

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (email_or_token, password) = decoded.split_once(':')?;
        Some(Credentials::Basic {
            email_or_token: email_or_token.to_string(),
            password: password.to_string(),
        })
    } else if scheme.eq_ignore_ascii_case("bearer") {
        Some(Credentials::Bearer(rest.trim().to_string()))
    } else {
        None
    }
}

enum Authenticated {
    Anonymous,
    User { user: User, token_used: bool },
}

async fn authenticate(
    pool: &SqlitePool,
    signer: &TokenSigner,
    credentials: Credentials,
) -> Result<Authenticated, AppError> {
    let (user, token_used) = match credentials {
        Credentials::Basic { email_or_token, .. } if email_or_token.is_empty() => {
            return Ok(Authenticated::Anonymous);
        }
        Credentials::Basic {
            email_or_token: token,
            password,
        } if password.is_empty() => (accounts::verify_auth_token(pool, signer, &token).await?, true),
        Credentials::Bearer(token) => (accounts::verify_auth_token(pool, signer, &token).await?, true),
        Credentials::Basic {
            email_or_token: email,
            password,
        } => {
            let user = accounts::find_by_email(pool, &email)
                .await?
                .filter(|user| user.verify_password(&password));
            (user, false)
        }
    };

    match user {
        Some(user) => Ok(Authenticated::User { user, token_used }),
        None => {
            tracing::debug!(token_used, "rejected API credentials");
            Err(AppError::Unauthorized)
        }
    }
}

async fn authenticate_parts<S>(parts: &Parts, state: &S) -> Result<Authenticated, AppError>
where
    SqlitePool: FromRef<S>,
    TokenSigner: FromRef<S>,
    S: Send + Sync,
{
    let pool = SqlitePool::from_ref(state);
    let signer = TokenSigner::from_ref(state);
    let credentials = credentials(&parts.headers).ok_or(AppError::Unauthorized)?;
    authenticate(&pool, &signer, credentials).await
}

/// Caller of a `/api/v1.0` endpoint.
///
/// An empty credential pair is the anonymous user; an email with an empty
/// password is a bearer token; anything else is checked against the stored
/// password hash. Unconfirmed accounts are turned away.
pub struct ApiUser {
    pub current: CurrentUser,
    pub token_used: bool,
}

impl<S> FromRequestParts<S> for ApiUser
where
    SqlitePool: FromRef<S>,
    TokenSigner: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match authenticate_parts(parts, state).await? {
            Authenticated::Anonymous => Ok(ApiUser {
                current: CurrentUser::Anonymous,
                token_used: false,
            }),
            Authenticated::User {
                mut user,
                token_used,
            } => {
                if !user.confirmed {
                    return Err(AppError::forbidden("Unconfirmed account"));
                }
                let pool = SqlitePool::from_ref(state);
                user.ping(&pool).await?;
                Ok(ApiUser {
                    current: CurrentUser::load(&pool, user).await?,
                    token_used,
                })
            }
        }
    }
}

/// A signed-in account, confirmed or not. Used by the account flows, which
/// an unconfirmed user must still be able to reach.
pub struct LoggedInUser {
    pub user: User,
    pub token_used: bool,
}

impl<S> FromRequestParts<S> for LoggedInUser
where
    SqlitePool: FromRef<S>,
    TokenSigner: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match authenticate_parts(parts, state).await? {
            Authenticated::Anonymous => Err(AppError::Unauthorized),
            Authenticated::User {
                mut user,
                token_used,
            } => {
                let pool = SqlitePool::from_ref(state);
                user.ping(&pool).await?;
                Ok(LoggedInUser { user, token_used })
            }
        }
    }
}
