//! Capability error types.

use crate::CapabilityName;
use thiserror::Error;

/// Capability errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The model asked for a capability that is not registered.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A capability with this name is already registered.
    #[error("duplicate capability: {0}")]
    DuplicateCapability(CapabilityName),

    /// An argument could not be coerced to its declared type.
    #[error("invalid argument `{param}`: {reason}")]
    Validation { param: String, reason: String },

    /// The underlying data source failed.
    #[error(transparent)]
    DataSource(#[from] sources::Error),

    /// The executor's rows could not be turned into JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
