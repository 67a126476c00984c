//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the shadowswap configuration file.

use crate::cli::commands::{EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use crate::config::redact_connection_string;
use crate::config::schema::DatabaseTarget;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also applies env overrides and validates
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Application: {}", config.application.name);
        println!("  Log Level: {}", config.application.log_level);

        match config.database_target {
            DatabaseTarget::PostgreSQL => {
                println!("  Database Target: PostgreSQL");
                if let Some(ref pg_config) = config.postgresql {
                    println!(
                        "  PostgreSQL Connection: {}",
                        redact_connection_string(&pg_config.connection_string)
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                    println!(
                        "  Statement Timeout: {}",
                        match pg_config.statement_timeout_seconds {
                            0 => "none".to_string(),
                            s => format!("{s}s"),
                        }
                    );
                }
            }
            DatabaseTarget::Memory => {
                println!("  Database Target: in-memory (data is lost on exit)");
            }
        }

        println!("  Batch Size: {}", config.load.batch_size);
        println!(
            "  File Logging: {}",
            if config.logging.local_enabled {
                format!("{} ({})", config.logging.local_path, config.logging.local_rotation)
            } else {
                "disabled".to_string()
            }
        );
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
    async fn test_validate_good_config() {
        let mut config = NamedTempFile::new().unwrap();
        writeln!(config, "database_target = \"memory\"\n[load]\nbatch_size = 500").unwrap();

        let code = ValidateArgs {}
            .execute(config.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_validate_bad_batch_size() {
        let mut config = NamedTempFile::new().unwrap();
        writeln!(config, "database_target = \"memory\"\n[load]\nbatch_size = 0").unwrap();

        let code = ValidateArgs {}
            .execute(config.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
