//! Status command implementation
//!
//! This module implements the `status` command, which shows how many rows
//! each live table serves.

use crate::adapters::store::create_reload_store;
use crate::cli::commands::{exit_code, EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use crate::domain::Table;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking live table status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(EXIT_CONFIG);
            }
        };

        let store = match create_reload_store(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to connect to database");
                println!("   Error: {}", e);
                return Ok(exit_code(&e));
            }
        };
        if let Err(e) = store.test_connection().await {
            println!("❌ Failed to connect to database");
            println!("   Error: {}", e);
            return Ok(exit_code(&e));
        }

        println!("📊 Live Tables ({})", store.name());
        println!();
        println!("{:<20} {:>12}", "Table", "Rows");
        println!("{}", "-".repeat(33));

        for table in Table::ALL {
            match store.live_count(table).await {
                Ok(count) => println!("{:<20} {:>12}", table.live_name(), count),
                Err(e) => {
                    println!("{:<20} {:>12}", table.live_name(), "unavailable");
                    tracing::warn!(table = %table, error = %e, "Failed to count live rows");
                }
            }
        }

        println!();
        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_status_on_memory_backend() {
        let mut config = NamedTempFile::new().unwrap();
        writeln!(config, "database_target = \"memory\"").unwrap();

        let code = StatusArgs {}
            .execute(config.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_status_missing_config() {
        let code = StatusArgs {}.execute("/nonexistent/shadowswap.toml").await.unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
