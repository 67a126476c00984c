//! Init-db command implementation
//!
//! Creates the live tables (and their serving children) in the configured
//! database. Safe to run repeatedly.

use crate::adapters::store::create_reload_store;
use crate::cli::commands::{exit_code, EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use clap::Args;

/// Arguments for the init-db command
#[derive(Args, Debug)]
pub struct InitDbArgs {}

impl InitDbArgs {
    /// Execute the init-db command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let outcome = async {
            let store = create_reload_store(&config).await?;
            store.test_connection().await?;
            store.ensure_schema().await?;
            Ok::<_, crate::domain::ReloadError>(store.name().to_string())
        }
        .await;

        match outcome {
            Ok(backend) => {
                println!("✅ Schema ready ({backend})");
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                tracing::error!(error = %e, "Schema initialization failed");
                eprintln!("❌ Schema initialization failed: {e}");
                Ok(exit_code(&e))
            }
        }
    }
}
