use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_SECRET_KEY: &str = "hard to guess string";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub run_migrations: bool,
    pub server_addr: String,
    /// Seeds every signed token. Read from `SECRET_KEY`.
    pub secret_key: String,
    /// Accounts registered with this email get the administrator role.
    pub admin_email: Option<String>,
    pub per_page: u32,
    pub max_per_page: u32,
    /// Lifetime in seconds of every issued token.
    pub token_expiration: i64,
    /// Echo issued confirmation/reset/change-email tokens in responses.
    /// Only meant for local development, there is no mail transport.
    pub expose_tokens: bool,
    pub log_level: String,
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://simpleblog.db".to_string(),
            run_migrations: true,
            server_addr: "127.0.0.1:5000".to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            admin_email: None,
            per_page: 5,
            max_per_page: 100,
            token_expiration: 3600,
            expose_tokens: false,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let s = Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("run_migrations", defaults.run_migrations)?
            .set_default("server_addr", defaults.server_addr)?
            .set_default("secret_key", defaults.secret_key)?
            .set_default("per_page", defaults.per_page)?
            .set_default("max_per_page", defaults.max_per_page)?
            .set_default("token_expiration", defaults.token_expiration)?
            .set_default("expose_tokens", defaults.expose_tokens)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", defaults.log_format)?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default())
            .build()?;

        s.try_deserialize()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_email_matches_case_insensitively() {
        let config = AppConfig {
            admin_email: Some("Admin@Example.com".to_string()),
            ..AppConfig::default()
        };
        assert!(config.is_admin_email("admin@example.com"));
        assert!(!config.is_admin_email("someone@example.com"));
    }

    #[test]
    fn no_admin_email_matches_nobody() {
        assert!(!AppConfig::default().is_admin_email("admin@example.com"));
    }

    #[test]
    fn default_secret_is_detected() {
        assert!(AppConfig::default().uses_default_secret());
        let config = AppConfig {
            secret_key: "s3cr3t".to_string(),
            ..AppConfig::default()
        };
        assert!(!config.uses_default_secret());
    }
}
