//! Structured logging setup using tracing
//!
//! Console output is always on. With `local_enabled`, JSON lines are also
//! written to a rolling file under `local_path`.

use crate::config::LoggingConfig;
use crate::domain::{ReloadError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Log file name prefix inside `local_path`
const LOG_FILE_PREFIX: &str = "shadowswap.log";

/// Guard that must be kept alive for the duration of the program
/// to ensure logs are flushed properly
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            _file_guard: file_guard,
        }
    }
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `log_level_str` when set.
///
/// # Errors
///
/// Returns `ReloadError::Configuration` for an unknown level or rotation, or
/// if the log directory cannot be created.
///
/// # Example
///
/// ```no_run
/// use shadowswap::logging::init_logging;
/// use shadowswap::config::LoggingConfig;
///
/// let config = LoggingConfig::default();
/// let _guard = init_logging("info", &config).expect("Failed to initialize logging");
/// // Keep _guard alive for the duration of the program
/// ```
pub fn init_logging(log_level_str: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_level = parse_log_level(log_level_str)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shadowswap={}", log_level)));

    let mut layers: Vec<BoxedLayer> = vec![tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(env_filter.clone())
        .boxed()];

    let file_guard = if config.local_enabled {
        let (layer, guard) = json_file_layer(config, env_filter)?;
        layers.push(layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry().with(layers).try_init().map_err(|e| {
        ReloadError::Configuration(format!("Failed to install the log subscriber: {e}"))
    })?;

    tracing::debug!(
        level = %log_level,
        local_enabled = config.local_enabled,
        local_path = %config.local_path,
        "Logging initialized"
    );

    Ok(LoggingGuard::new(file_guard))
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// JSON lines into `<local_path>/shadowswap.log`, rotated per config
///
/// Reload events carry `reload_id` as a top-level field, so one reload can be
/// filtered out of the file with `jq`.
fn json_file_layer(config: &LoggingConfig, filter: EnvFilter) -> Result<(BoxedLayer, WorkerGuard)> {
    let rotation = parse_rotation(&config.local_rotation)?;

    std::fs::create_dir_all(&config.local_path).map_err(|e| {
        ReloadError::Configuration(format!(
            "Failed to create log directory {}: {}",
            config.local_path, e
        ))
    })?;

    let appender = RollingFileAppender::new(rotation, &config.local_path, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_current_span(false)
        .with_writer(writer)
        .with_filter(filter)
        .boxed();

    Ok((layer, guard))
}

/// Parse log level from string
fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ReloadError::Configuration(format!(
            "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
            level_str
        ))),
    }
}

fn parse_rotation(rotation: &str) -> Result<Rotation> {
    match rotation {
        "daily" => Ok(Rotation::DAILY),
        "hourly" => Ok(Rotation::HOURLY),
        "never" => Ok(Rotation::NEVER),
        other => Err(ReloadError::Configuration(format!(
            "Invalid log rotation: {other}. Must be one of: daily, hourly, never"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("trace" => Level::TRACE)]
    #[test_case("Debug" => Level::DEBUG)]
    #[test_case("INFO" => Level::INFO)]
    #[test_case("warn" => Level::WARN)]
    #[test_case("error" => Level::ERROR)]
    fn test_parse_log_level(level: &str) -> Level {
        parse_log_level(level).unwrap()
    }

    #[test]
    fn test_parse_log_level_invalid() {
        assert!(parse_log_level("verbose").is_err());
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn test_parse_rotation() {
        assert_eq!(parse_rotation("hourly").unwrap(), Rotation::HOURLY);
        assert_eq!(parse_rotation("never").unwrap(), Rotation::NEVER);
        assert!(parse_rotation("weekly").is_err());
    }

    #[test]
    fn test_json_file_layer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            local_enabled: true,
            local_path: dir.path().join("logs").display().to_string(),
            local_rotation: "never".to_string(),
        };
        let (_layer, _guard) = json_file_layer(&config, EnvFilter::new("shadowswap=info")).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
