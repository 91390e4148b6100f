use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Builds the shared Postgres pool: bounded max connections, a small warm
/// minimum, and a short acquire timeout so a saturated pool fails fast
/// instead of queuing requests behind the broker's ack deadline.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.connection_string())
        .await?;
    Ok(pool)
}
