use crate::{config::AppConfig, error::AppError, permission::default_roles};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

// Setup the database, execute any migrations and make sure the roles exist
pub async fn setup_database(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    if config.run_migrations {
        migrate(&pool).await?;
    }
    insert_roles(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database, migrated and seeded.
pub async fn in_memory() -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    insert_roles(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations executed");
    Ok(())
}

/// Creates missing roles and resets the permissions of existing ones.
pub async fn insert_roles(pool: &SqlitePool) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for (name, permissions, is_default) in default_roles() {
        sqlx::query(
            r#"
            INSERT INTO roles (name, permissions, is_default)
            VALUES (?, ?, ?)
            ON CONFLICT (name)
            DO UPDATE SET
                permissions = excluded.permissions,
                is_default = excluded.is_default
            "#,
        )
        .bind(name)
        .bind(permissions.bits())
        .bind(is_default)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
