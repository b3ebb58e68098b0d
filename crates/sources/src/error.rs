use thiserror::Error;

/// Data-source errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request never reached the service (DNS, connect, TLS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("{service} API error: {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// No usable access token could be obtained.
    #[error("auth error: {0}")]
    Auth(String),

    /// The service answered, but not in the shape we expected.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The source is missing required configuration.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
