//! Import command implementation
//!
//! This module implements the `import` command, which reloads one entity
//! kind from a feed file through a shadow table and swaps it in atomically.

use crate::cli::commands::{exit_code, EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use crate::core::reload::{ReloadCoordinator, ReloadSummary};
use crate::core::source::{open_records, RecordFormat};
use crate::domain::EntityKind;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Entity kind to reload (patients or payments)
    pub entity: EntityKind,

    /// Feed file to load
    #[arg(short, long)]
    pub file: PathBuf,

    /// Feed format (json, ndjson or csv); inferred from the extension if omitted
    #[arg(long)]
    pub format: Option<RecordFormat>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(entity = %self.entity, file = %self.file.display(), "Starting import command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Configuration could not be loaded");
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if !self.yes {
            println!("Import Configuration:");
            println!("  Entity: {}", self.entity);
            println!("  File: {}", self.file.display());
            println!(
                "  Format: {}",
                self.format
                    .or_else(|| RecordFormat::from_path(&self.file))
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            println!("  Batch size: {}", config.load.batch_size);
            println!("  Database target: {:?}", config.database_target);
            println!();
            println!("The live {} table will be replaced by this feed.", self.entity);
            print!("Proceed with import? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Import cancelled.");
                return Ok(EXIT_SUCCESS);
            }
        }

        let records = match open_records(&self.file, self.entity, self.format) {
            Ok(records) => records,
            Err(e) => {
                eprintln!("Failed to open feed: {e}");
                return Ok(exit_code(&e));
            }
        };

        let coordinator = match ReloadCoordinator::from_config(&config, shutdown_signal).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize reload");
                eprintln!("Failed to initialize reload: {e}");
                return Ok(exit_code(&e));
            }
        };

        println!("Reloading {} from {}...", self.entity, self.file.display());

        match coordinator.reload_source(self.entity, records).await {
            Ok(summary) => {
                print_summary(&summary);
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!();
                if e.is_rejection() {
                    eprintln!("Reload rejected, live {} unchanged: {e}", self.entity);
                } else {
                    eprintln!("Reload failed: {e}");
                }
                if let crate::domain::ReloadError::Ingestion(ref ingestion) = e {
                    if let Some(ref record) = ingestion.offending_record {
                        eprintln!("  Offending record: {record}");
                    }
                }
                Ok(exit_code(&e))
            }
        }
    }
}

fn print_summary(summary: &ReloadSummary) {
    let report = &summary.report;
    println!();
    println!("Reload Summary:");
    println!("  Reload ID: {}", summary.reload_id);
    println!("  Entity: {}", summary.entity);
    println!("  Received: {}", report.received);
    println!("  Staged: {}", report.staged);
    println!("    Inserted: {}", report.inserted);
    println!("    Updated: {}", report.updated);
    println!("    Unchanged: {}", report.unchanged);
    println!("  Dropped (duplicate): {}", report.dropped_duplicates);
    println!("  Dropped (unknown patient): {}", report.dropped_missing_owner);
    if let Some(rows) = summary.stats_rows {
        println!("  Patient stats rows: {rows}");
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();
}
