//! Storage backend factory
//!
//! This module provides the factory function that creates a storage backend
//! based on configuration.

use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
use crate::adapters::store::traits::ReloadStore;
use crate::config::schema::{DatabaseTarget, ShadowswapConfig};
use crate::domain::{ReloadError, Result};
use std::sync::Arc;

/// Create a storage backend based on the configuration
///
/// This factory function examines the `database_target` in the configuration
/// and creates the matching [`ReloadStore`] implementation.
///
/// # Errors
///
/// Returns an error if the PostgreSQL section is missing or the connection
/// pool cannot be built.
pub async fn create_reload_store(
    config: &ShadowswapConfig,
) -> Result<Arc<dyn ReloadStore + Send + Sync>> {
    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                ReloadError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL reload store");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            let store = PostgreSQLStore::new(client);

            Ok(Arc::new(store) as Arc<dyn ReloadStore + Send + Sync>)
        }
        DatabaseTarget::Memory => {
            tracing::info!("Creating in-memory reload store");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn ReloadStore + Send + Sync>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[tokio::test]
    async fn test_create_memory_store() {
        let config = parse_config("database_target = \"memory\"").unwrap();
        let store = create_reload_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_postgresql_target_requires_section() {
        let mut config = parse_config("database_target = \"memory\"").unwrap();
        config.database_target = DatabaseTarget::PostgreSQL;
        let result = create_reload_store(&config).await;
        assert!(matches!(result, Err(ReloadError::Configuration(_))));
    }
}
