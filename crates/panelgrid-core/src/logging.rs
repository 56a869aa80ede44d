#![forbid(unsafe_code)]

//! Logging bootstrap.
//!
//! With the `tracing` feature the `tracing` macros are re-exported so
//! adapters can log through `panelgrid_core::warn!` without a direct
//! dependency. With `tracing-json` a host can install a JSON subscriber
//! filtered by `RUST_LOG` (falling back to caller-supplied directives).
//!
//! Library code never installs a subscriber on its own.

#[cfg(feature = "tracing")]
pub use tracing::{debug, error, info, trace, warn};

/// Errors from subscriber installation.
#[cfg(feature = "tracing-json")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// The filter directives could not be parsed.
    InvalidFilter(String),
    /// A global subscriber was already installed.
    AlreadyInitialized(String),
}

#[cfg(feature = "tracing-json")]
impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFilter(reason) => write!(f, "invalid log filter: {reason}"),
            Self::AlreadyInitialized(reason) => {
                write!(f, "global subscriber already installed: {reason}")
            }
        }
    }
}

#[cfg(feature = "tracing-json")]
impl std::error::Error for LoggingError {}

/// Parse filter directives such as `"panelgrid_layout=debug,warn"`.
#[cfg(feature = "tracing-json")]
pub fn parse_filter(
    directives: &str,
) -> Result<tracing_subscriber::EnvFilter, LoggingError> {
    tracing_subscriber::EnvFilter::try_new(directives)
        .map_err(|err| LoggingError::InvalidFilter(err.to_string()))
}

/// Install a global JSON subscriber.
///
/// `RUST_LOG` wins when set and valid; otherwise `default_directives` apply.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber(default_directives: &str) -> Result<(), LoggingError> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(default_directives)?,
    };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| LoggingError::AlreadyInitialized(err.to_string()))
}
