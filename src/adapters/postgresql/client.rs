//! PostgreSQL client implementation
//!
//! This module owns the connection pool shared by every reload.

use crate::config::schema::PostgreSQLConfig;
use crate::config::secret::redact_connection_string;
use crate::domain::{ReloadError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::NoTls;

/// Schema applied by `init-db`
const INITIAL_SCHEMA: &str = include_str!("../../../migrations/001_initial_schema.sql");

/// PostgreSQL client for shadowswap
///
/// Hands out pooled connections. A reload holds one connection for its whole
/// transaction.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// The pool connects lazily; use [`test_connection`](Self::test_connection)
    /// to fail fast.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the pool
    /// cannot be built.
    pub async fn new(config: PostgreSQLConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config =
            config.connection_string.expose_secret().parse().map_err(|e| {
                ReloadError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
            })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .build()
            .map_err(|e| {
                ReloadError::Database(format!("Failed to create connection pool: {}", e))
            })?;

        tracing::debug!(
            target_db = %redact_connection_string(&config.connection_string),
            max_connections = config.max_connections,
            "PostgreSQL pool created"
        );

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| ReloadError::Connection(format!("Connection test failed: {}", e)))?;

        tracing::info!("PostgreSQL connection test successful");
        Ok(())
    }

    /// Create the live parent tables if they don't exist
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .batch_execute(INITIAL_SCHEMA)
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to execute migration: {}", e)))?;

        tracing::info!("PostgreSQL schema initialized successfully");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::Connection` if no connection can be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            ReloadError::Connection(format!("Failed to get connection from pool: {}", e))
        })
    }

    /// Per-statement timeout applied inside reload transactions
    pub fn statement_timeout_seconds(&self) -> u64 {
        self.config.statement_timeout_seconds
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(&self.config.connection_string)
    }
}
