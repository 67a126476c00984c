//! Configuration management for shadowswap.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! shadowswap uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SHADOWSWAP_*` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (name, log level)
//! - [`DatabaseTarget`] - Which storage backend reloads run against
//! - [`PostgreSQLConfig`] - Connection pool and statement timeout
//! - [`LoadConfig`] - Bulk load chunk size
//! - [`LoggingConfig`] - Local log files and rotation
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${SHADOWSWAP_DATABASE_URL}"
//! max_connections = 4
//!
//! [load]
//! batch_size = 1000
//! ```
//!
//! # Validation
//!
//! ```rust,no_run
//! use shadowswap::config::load_config;
//!
//! # fn example() {
//! match load_config("shadowswap.toml") {
//!     Ok(_config) => println!("Configuration valid"),
//!     Err(e) => eprintln!("Configuration error: {}", e),
//! }
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, DatabaseTarget, LoadConfig, LoggingConfig, PostgreSQLConfig,
    ShadowswapConfig,
};
pub use secret::{redact_connection_string, secret_string, SecretString, SecretValue};
