//! `PostgreSQL` store adapter for the Vitrine order lifecycle core.
//!
//! Implements the order and product store traits on a `sqlx` connection
//! pool. The SQL carries the guarantees the core's concurrency model
//! expects from its persistence layer:
//!
//! - order numbers come from a database sequence consumed inside the
//!   insert transaction,
//! - checkout idempotency keys are enforced by a unique index on the
//!   insert path,
//! - stock decrements are single conditional `UPDATE` statements, and
//! - order updates are guarded by the stored revision.
//!
//! Order and product records are stored as JSONB snapshots next to the
//! columns queries filter on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod store;

use std::time::Duration;

use nutype::nutype;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use tracing::info;
use vitrine::errors::StoreError;

/// Errors raised while setting up the adapter itself.
#[derive(Debug, Error)]
pub enum PostgresSetupError {
    /// The connection pool could not be created.
    #[error("failed to create postgres connection pool: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// Schema initialization failed.
    #[error("failed to initialize postgres schema: {0}")]
    SchemaFailed(#[source] sqlx::Error),
}

/// Maximum number of database connections in the pool.
///
/// Backed by `NonZeroU32`, so a zero-sized pool is unrepresentable.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(std::num::NonZeroU32);

/// Connection-pool configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10).
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30s).
    pub acquire_timeout: Duration,
    /// Idle timeout for pooled connections (default: 10 minutes).
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Order and product store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connects with default configuration.
    pub async fn connect<S: Into<String>>(
        connection_string: S,
    ) -> Result<Self, PostgresSetupError> {
        Self::connect_with(connection_string, PostgresConfig::default()).await
    }

    /// Connects with custom configuration.
    pub async fn connect_with<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresSetupError> {
        let connection_string = connection_string.into();
        let max_connections: std::num::NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string)
            .await
            .map_err(PostgresSetupError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    ///
    /// Use this to share one pool across components.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Creates the tables, indexes and the order-number sequence if they do
    /// not exist.
    pub async fn initialize_schema(&self) -> Result<(), PostgresSetupError> {
        let statements = [
            "CREATE SEQUENCE IF NOT EXISTS vitrine_order_number_seq START 1",
            "CREATE TABLE IF NOT EXISTS vitrine_orders (
                id TEXT PRIMARY KEY,
                number BIGINT NOT NULL UNIQUE,
                buyer_id TEXT NOT NULL,
                checkout_key TEXT,
                status TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                revision BIGINT NOT NULL,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS vitrine_orders_checkout_key_idx
                ON vitrine_orders (checkout_key) WHERE checkout_key IS NOT NULL",
            "CREATE INDEX IF NOT EXISTS vitrine_orders_buyer_idx
                ON vitrine_orders (buyer_id, number DESC)",
            "CREATE TABLE IF NOT EXISTS vitrine_products (
                id TEXT PRIMARY KEY,
                stock INTEGER NOT NULL CHECK (stock >= 0),
                record JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(PostgresSetupError::SchemaFailed)?;
        }

        info!("vitrine postgres schema ready");
        Ok(())
    }
}

/// Maps an infrastructure-level sqlx failure into the core's store error.
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// Whether an error is a unique violation on the named index/constraint.
pub(crate) fn is_unique_violation(error: &sqlx::Error, constraint: &str) -> bool {
    match error {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err
                    .constraint()
                    .is_some_and(|name| name.contains(constraint))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_sane() {
        let config = PostgresConfig::default();
        let max: std::num::NonZeroU32 = config.max_connections.into();
        assert_eq!(max.get(), 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn pool_timeout_maps_to_backend_error() {
        let mapped = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(mapped, StoreError::Backend(_)));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(
            &sqlx::Error::PoolTimedOut,
            "vitrine_orders_checkout_key_idx"
        ));
        assert!(!is_unique_violation(
            &sqlx::Error::RowNotFound,
            "vitrine_orders_checkout_key_idx"
        ));
    }
}
