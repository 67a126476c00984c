//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for shadowswap using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Shadowswap - zero-downtime patient and payment reloads
#[derive(Parser, Debug)]
#[command(name = "shadowswap")]
#[command(version, about, long_about = None)]
#[command(author = "Shadowswap Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "shadowswap.toml", env = "SHADOWSWAP_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SHADOWSWAP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the live tables in the configured database
    InitDb(commands::init_db::InitDbArgs),

    /// Reload patients or payments from a feed file
    Import(commands::import::ImportArgs),

    /// Write a synthetic feed file for load testing
    Seed(commands::seed::SeedArgs),

    /// Show live row counts
    Status(commands::status::StatusArgs),

    /// Page through live patients, payments or payment totals
    Query(commands::query::QueryArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKind;

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from(["shadowswap", "import", "patients", "--file", "patients.json"]);
        assert_eq!(cli.config, "shadowswap.toml");
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.entity, EntityKind::Patient);
                assert_eq!(args.file.to_str(), Some("patients.json"));
                assert!(args.format.is_none());
                assert!(!args.yes);
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["shadowswap", "--config", "custom.toml", "status"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["shadowswap", "--log-level", "debug", "init-db"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::InitDb(_)));
    }

    #[test]
    fn test_cli_rejects_unknown_entity() {
        let result = Cli::try_parse_from(["shadowswap", "import", "invoices", "--file", "x.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_seed() {
        let cli = Cli::parse_from(["shadowswap", "seed", "payments", "--count", "10"]);
        match cli.command {
            Commands::Seed(args) => {
                assert_eq!(args.entity, EntityKind::Payment);
                assert_eq!(args.count, 10);
            }
            other => panic!("expected seed, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_query_patients() {
        let cli = Cli::parse_from([
            "shadowswap",
            "query",
            "patients",
            "--payment-min",
            "10.50",
            "--page",
            "2",
        ]);
        match cli.command {
            Commands::Query(args) => match args.target {
                commands::query::QueryTarget::Patients {
                    payment_min,
                    payment_max,
                    page,
                } => {
                    assert_eq!(payment_min, Some(rust_decimal::Decimal::new(1050, 2)));
                    assert!(payment_max.is_none());
                    assert_eq!(page, 2);
                }
                other => panic!("expected patients, got {other:?}"),
            },
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_query_rejects_page_zero() {
        let result = Cli::try_parse_from(["shadowswap", "query", "stats", "--page", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["shadowswap", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["shadowswap", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
