/*!
 * Error Types
 * Centralized error handling with thiserror and miette support
 */

use miette::Diagnostic;
use thiserror::Error;

/// Monitor operation result
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Configuration errors
///
/// These never abort monitoring: the configurator skips the offending entry
/// and carries on with the rest of the list.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid byte value: {0:?}")]
    #[diagnostic(
        code(config::invalid_byte_value),
        help("Use digits optionally followed by K or M, e.g. 150M or 4096K.")
    )]
    InvalidByteValue(String),

    #[error("Malformed limit entry: {0:?}")]
    #[diagnostic(
        code(config::malformed_entry),
        help("Entries take the form ProcessName:Value and are separated by commas.")
    )]
    MalformedEntry(String),

    #[error("Invalid process name pattern {pattern:?}: {reason}")]
    #[diagnostic(
        code(config::invalid_pattern),
        help("Patterns are shell globs; only * and ? wildcards are expected.")
    )]
    InvalidPattern { pattern: String, reason: String },
}

/// Unified monitor error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn {thread} thread: {reason}")]
    #[diagnostic(
        code(monitor::spawn_failed),
        help("The process may have hit its thread limit. Check ulimit -u.")
    )]
    SpawnFailed { thread: &'static str, reason: String },

    #[error("Main context is closed")]
    #[diagnostic(
        code(monitor::dispatcher_closed),
        help("The main context was shut down before the job could be queued.")
    )]
    DispatcherClosed,

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(monitor::io_error),
        help("A memory counter could not be read. Check that /proc is mounted.")
    )]
    Io(String),
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Io(err.to_string())
    }
}
