use crate::config::DbConfig;
use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Open the single connection a stage uses for its whole run.
pub async fn connect(config: &DbConfig) -> Result<PgPool> {
    info!("Connecting to {}", config.redacted_url());
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.connection_url())
        .await?;
    Ok(pool)
}
