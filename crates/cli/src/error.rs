//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `--args` was not a JSON object.
    #[error("invalid --args: {0}")]
    InvalidArgs(String),

    /// A capability invoked with `cloudlens call` reported an error.
    #[error("{name} failed: {message}")]
    CallFailed { name: String, message: String },

    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    #[error(transparent)]
    Capability(#[from] capability::Error),

    #[error(transparent)]
    Source(#[from] sources::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
