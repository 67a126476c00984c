//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{DatabaseTarget, ShadowswapConfig};
use crate::config::secret_string;
use crate::domain::errors::ReloadError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ShadowswapConfig
/// 4. Applies environment variable overrides (SHADOWSWAP_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `ReloadError::Configuration` if the file cannot be read, a
/// referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use shadowswap::config::loader::load_config;
///
/// let config = load_config("shadowswap.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ShadowswapConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ReloadError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ReloadError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text the same way [`load_config`] parses a file
pub fn parse_config(contents: &str) -> Result<ShadowswapConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ShadowswapConfig = toml::from_str(&contents)
        .map_err(|e| ReloadError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ReloadError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are passed through untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ReloadError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(ReloadError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using SHADOWSWAP_* prefix
///
/// Environment variables follow the pattern: SHADOWSWAP_<SECTION>_<KEY>
/// For example: SHADOWSWAP_LOAD_BATCH_SIZE, SHADOWSWAP_POSTGRESQL_CONNECTION_STRING
fn apply_env_overrides(config: &mut ShadowswapConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("SHADOWSWAP_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("SHADOWSWAP_DATABASE_TARGET") {
        config.database_target = match val.to_lowercase().as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(ReloadError::Configuration(format!(
                    "Invalid SHADOWSWAP_DATABASE_TARGET '{other}'. Must be 'postgresql' or 'memory'"
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg_config) = config.postgresql {
        if let Ok(val) = std::env::var("SHADOWSWAP_POSTGRESQL_CONNECTION_STRING") {
            pg_config.connection_string = secret_string(val);
        }
        if let Ok(val) = std::env::var("SHADOWSWAP_POSTGRESQL_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                pg_config.max_connections = max;
            }
        }
        if let Ok(val) = std::env::var("SHADOWSWAP_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS") {
            if let Ok(timeout) = val.parse() {
                pg_config.statement_timeout_seconds = timeout;
            }
        }
    }

    // Load overrides
    if let Ok(val) = std::env::var("SHADOWSWAP_LOAD_BATCH_SIZE") {
        if let Ok(size) = val.parse() {
            config.load.batch_size = size;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("SHADOWSWAP_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("SHADOWSWAP_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("SHADOWSWAP_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("SHADOWSWAP_TEST_SUBST_VAR", "test_value");
        let input = "password = \"${SHADOWSWAP_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"");
        std::env::remove_var("SHADOWSWAP_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("SHADOWSWAP_TEST_COMMENTED_VAR");
        let input = "# connection_string = \"${SHADOWSWAP_TEST_COMMENTED_VAR}\"\nname = \"x\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("SHADOWSWAP_TEST_MISSING_VAR");
        let input = "password = \"${SHADOWSWAP_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("SHADOWSWAP_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(ReloadError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
database_target = "memory"

[application]
name = "shadowswap"
log_level = "debug"

[load]
batch_size = 250
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.load.batch_size, 250);
        assert_eq!(config.database_target, DatabaseTarget::Memory);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let err = parse_config("database_target = \"memory\"\n[load]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }
}
