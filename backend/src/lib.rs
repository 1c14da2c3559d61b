pub mod accounts;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod markdown;
pub mod models;
pub mod params;
pub mod permission;
pub mod routes;

use crate::auth::TokenSigner;
use crate::config::AppConfig;
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub tokens: TokenSigner,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig) -> Self {
        let tokens = TokenSigner::new(config.secret_key.as_bytes());
        Self { db, config, tokens }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for TokenSigner {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
