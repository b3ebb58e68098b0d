use std::time::Duration;
use thiserror::Error;

/// Errors from a model round-trip.
///
/// Any of these ends the current conversation; the agent falls back to
/// whatever partial text it has seen.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    #[error("network: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider api ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider refused the prompt (safety filters and similar).
    #[error("prompt blocked: {0}")]
    Blocked(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}
