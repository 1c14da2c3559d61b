use anyhow::Context;
use simpleblog::{AppState, config::AppConfig, db, logging, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = AppConfig::load().context("failed to load configuration")?;
    logging::init_tracing(&settings.log_level, &settings.log_format);

    if !logging::is_valid_format(&settings.log_format) {
        tracing::warn!(format = %settings.log_format, "unknown log format, using text");
    }
    if settings.uses_default_secret() {
        tracing::warn!("SECRET_KEY is not set, tokens are signed with the built-in default");
    }

    let pool = db::setup_database(&settings).await?;
    let state = AppState::new(pool, settings.clone());
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server_addr))?;
    tracing::info!(addr = %settings.server_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
