//! Seed command implementation
//!
//! Writes a synthetic JSON feed for load testing.

use crate::cli::commands::{exit_code, EXIT_SUCCESS};
use crate::core::source::seed::write_seed_file;
use crate::domain::EntityKind;
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the seed command
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Entity kind to generate (patients or payments)
    pub entity: EntityKind,

    /// Number of records to write
    #[arg(short, long, default_value_t = 1_000_000)]
    pub count: u64,

    /// Output file (defaults to <entity>_seed.json)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

impl SeedArgs {
    /// Output path, defaulting to `<entity>_seed.json`
    pub fn output(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_seed.json", self.entity)))
    }

    /// Execute the seed command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let output = self.output();
        println!(
            "Writing {} {} records to {}",
            self.count,
            self.entity,
            output.display()
        );

        let start = Instant::now();
        match write_seed_file(&output, self.entity, self.count) {
            Ok(()) => {
                println!("Written in {:.2}s", start.elapsed().as_secs_f64());
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Failed to write seed file: {e}");
                Ok(exit_code(&e))
            }
        }
    }
}
