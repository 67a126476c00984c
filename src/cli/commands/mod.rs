//! CLI command implementations
//!
//! This module contains all CLI command implementations. Commands report
//! failures through their exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | Success |
//! | 1    | Reload rejected, live data unchanged |
//! | 2    | Configuration error |
//! | 4    | Connection error |
//! | 5    | Fatal error |
//! | 130  | Interrupted |

pub mod import;
pub mod init;
pub mod init_db;
pub mod query;
pub mod seed;
pub mod status;
pub mod validate;

use crate::domain::ReloadError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_REJECTED: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code reported for an error
pub fn exit_code(error: &ReloadError) -> i32 {
    match error {
        ReloadError::Cancelled(_) => EXIT_INTERRUPTED,
        ReloadError::Configuration(_) => EXIT_CONFIG,
        ReloadError::Connection(_) => EXIT_CONNECTION,
        e if e.is_rejection() => EXIT_REJECTED,
        _ => EXIT_FATAL,
    }
}
