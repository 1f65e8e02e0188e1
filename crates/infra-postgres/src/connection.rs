// Postgres Connection Pool Setup

use crate::error::map_sqlx_error;
use pgmq_kit_core::error::{QueueError, Result};
use pgmq_kit_core::ClientConfig;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use tracing::info;

const URL_SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];

/// Connection options from config; an explicit URL wins over the parts
pub fn connect_options(config: &ClientConfig) -> Result<PgConnectOptions> {
    match &config.url {
        Some(url) if !URL_SCHEMES.iter().any(|s| url.starts_with(s)) => Err(QueueError::Config(
            "Invalid database URL: expected a postgres:// or postgresql:// scheme".to_string(),
        )),
        Some(url) => PgConnectOptions::from_str(url)
            .map_err(|e| QueueError::Config(format!("Invalid database URL: {}", e))),
        None => Ok(PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.username)
            .password(&config.password)),
    }
}

/// Fixed-size pool: connections are acquired per call and released on drop
pub fn pool_options(config: &ClientConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(config.pool_size)
        .acquire_timeout(config.acquire_timeout)
}

/// Create the connection pool and verify the server is reachable
pub async fn create_pool(config: &ClientConfig) -> Result<PgPool> {
    let options = connect_options(config)?;

    let pool = pool_options(config)
        .connect_with(options)
        .await
        .map_err(|e| map_sqlx_error(e, None))?;

    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        pool_size = config.pool_size,
        "Connected to Postgres"
    );
    Ok(pool)
}

/// Create a pool that connects on first use (no network I/O here)
pub fn create_lazy_pool(config: &ClientConfig) -> Result<PgPool> {
    let options = connect_options(config)?;
    Ok(pool_options(config).connect_lazy_with(options))
}
