//! Account lifecycle: registration, passwords, and the signed-token flows
//! for confirmation, password reset, email change and API auth.
//!
//! Every token check fails closed: a bad signature, an expired token, a
//! token minted for another purpose or for another user all yield `false`
//! (or `None`) rather than an error.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::{
    auth::{
        TokenSigner, password,
        token::{AuthClaims, ChangeEmailClaims, ConfirmClaims, ResetClaims, TokenError},
    },
    config::AppConfig,
    error::AppError,
    models::{Role, USER_COLUMNS, User},
    permission::Permission,
};

pub const MAX_EMAIL_LEN: usize = 64;

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let len = email.chars().count();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if len == 0 || len > MAX_EMAIL_LEN || !well_formed {
        return Err(AppError::bad_request("invalid email address"));
    }
    Ok(())
}

pub fn gravatar_hash(email: &str) -> String {
    hex::encode(Sha256::digest(normalize_email(email).as_bytes()))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(sqlx::query_as::<_, User>(&query)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?)
}

pub async fn email_taken(pool: &SqlitePool, email: &str) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// The configured admin email gets the full-permission role, everyone else
/// the role flagged default.
async fn role_for(
    pool: &SqlitePool,
    config: &AppConfig,
    email: &str,
) -> Result<Option<Role>, AppError> {
    if config.is_admin_email(email) {
        let admin = sqlx::query_as::<_, Role>(
            "SELECT id, name, is_default, permissions FROM roles WHERE permissions = ? LIMIT 1",
        )
        .bind(Permission::ALL.bits())
        .fetch_optional(pool)
        .await?;
        if admin.is_some() {
            return Ok(admin);
        }
    }

    Ok(sqlx::query_as::<_, Role>(
        "SELECT id, name, is_default, permissions FROM roles WHERE is_default = 1 LIMIT 1",
    )
    .fetch_optional(pool)
    .await?)
}

pub async fn create_user(
    pool: &SqlitePool,
    config: &AppConfig,
    new_user: NewUser<'_>,
) -> Result<User, AppError> {
    let email = normalize_email(new_user.email);
    let username = new_user.username.trim();
    validate_email(&email)?;
    password::validate_password(new_user.password)?;
    if username.is_empty() {
        return Err(AppError::bad_request("username must not be empty"));
    }

    if email_taken(pool, &email).await? {
        return Err(AppError::conflict("email already registered"));
    }
    if username_taken(pool, username).await? {
        return Err(AppError::conflict("username already taken"));
    }

    let password_hash = password::hash_password(new_user.password)?;
    let role = role_for(pool, config, &email).await?;
    let now = Utc::now();

    let query = format!(
        "INSERT INTO users (email, username, password_hash, gravatar_hash, register_date, last_seen, confirmed, role_id)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?)
         RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(&email)
        .bind(username)
        .bind(&password_hash)
        .bind(gravatar_hash(&email))
        .bind(now)
        .bind(now)
        .bind(role.as_ref().map(|r| r.id))
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::conflict("email or username already registered")
            } else {
                e
            }
        })?;

    tracing::info!(
        user_id = user.id,
        role = role.as_ref().map(|r| r.name.as_str()),
        "user registered"
    );
    Ok(user)
}

/// Resolves a bearer token to its user; any token problem yields `None`.
pub async fn verify_auth_token(
    pool: &SqlitePool,
    signer: &TokenSigner,
    token: &str,
) -> Result<Option<User>, AppError> {
    match signer.verify::<AuthClaims>(token) {
        Some(claims) => find_by_id(pool, claims.id).await,
        None => Ok(None),
    }
}

impl User {
    pub fn verify_password(&self, password: &str) -> bool {
        password::verify_password(password, &self.password_hash)
    }

    pub async fn set_password(&mut self, pool: &SqlitePool, password: &str) -> Result<(), AppError> {
        password::validate_password(password)?;
        let hash = password::hash_password(password)?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&hash)
            .bind(self.id)
            .execute(pool)
            .await?;
        self.password_hash = hash;
        Ok(())
    }

    pub fn gravatar(&self, size: u32, default: &str, rating: &str) -> String {
        let hash = self
            .gravatar_hash
            .clone()
            .unwrap_or_else(|| gravatar_hash(&self.email));
        format!("https://secure.gravatar.com/avatar/{hash}?s={size}&d={default}&r={rating}")
    }

    pub fn generate_confirmation_token(
        &self,
        signer: &TokenSigner,
        expiration: i64,
    ) -> Result<String, TokenError> {
        signer.sign(&ConfirmClaims { confirm: self.id }, expiration)
    }

    pub async fn confirm(
        &mut self,
        pool: &SqlitePool,
        signer: &TokenSigner,
        token: &str,
    ) -> Result<bool, AppError> {
        let Some(claims) = signer.verify::<ConfirmClaims>(token) else {
            return Ok(false);
        };
        if claims.confirm != self.id {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET confirmed = 1 WHERE id = ?")
            .bind(self.id)
            .execute(pool)
            .await?;
        self.confirmed = true;
        tracing::info!(user_id = self.id, "email confirmed");
        Ok(true)
    }

    pub fn generate_reset_password_token(
        &self,
        signer: &TokenSigner,
        expiration: i64,
    ) -> Result<String, TokenError> {
        signer.sign(&ResetClaims { reset: self.id }, expiration)
    }

    pub async fn reset_password(
        &mut self,
        pool: &SqlitePool,
        signer: &TokenSigner,
        token: &str,
        new_password: &str,
    ) -> Result<bool, AppError> {
        let Some(claims) = signer.verify::<ResetClaims>(token) else {
            return Ok(false);
        };
        if claims.reset != self.id {
            return Ok(false);
        }

        self.set_password(pool, new_password).await?;
        tracing::info!(user_id = self.id, "password reset");
        Ok(true)
    }

    pub fn generate_change_email_token(
        &self,
        signer: &TokenSigner,
        new_email: &str,
        expiration: i64,
    ) -> Result<String, TokenError> {
        signer.sign(
            &ChangeEmailClaims {
                change_email: self.id,
                new_email: normalize_email(new_email),
            },
            expiration,
        )
    }

    /// Commits the address carried by the token, unless it has been taken
    /// by another account since the token was issued.
    pub async fn change_email(
        &mut self,
        pool: &SqlitePool,
        signer: &TokenSigner,
        token: &str,
    ) -> Result<bool, AppError> {
        let Some(claims) = signer.verify::<ChangeEmailClaims>(token) else {
            return Ok(false);
        };
        if claims.change_email != self.id {
            return Ok(false);
        }

        let new_email = normalize_email(&claims.new_email);
        if new_email.is_empty() || email_taken(pool, &new_email).await? {
            return Ok(false);
        }

        let new_hash = gravatar_hash(&new_email);
        let updated = sqlx::query("UPDATE users SET email = ?, gravatar_hash = ? WHERE id = ?")
            .bind(&new_email)
            .bind(&new_hash)
            .bind(self.id)
            .execute(pool)
            .await
            .map_err(AppError::from);

        match updated {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => return Ok(false),
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = self.id, "email changed");
        self.email = new_email;
        self.gravatar_hash = Some(new_hash);
        Ok(true)
    }

    pub fn generate_auth_token(
        &self,
        signer: &TokenSigner,
        expiration: i64,
    ) -> Result<String, TokenError> {
        signer.sign(&AuthClaims { id: self.id }, expiration)
    }

    /// Refreshes `last_seen`.
    pub async fn ping(&mut self, pool: &SqlitePool) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(now)
            .bind(self.id)
            .execute(pool)
            .await?;
        self.last_seen = now;
        Ok(())
    }
}
