use thiserror::Error;

/// Errors surfaced to the caller of [`crate::Agent::handle_chat`].
///
/// Tool and model failures are not errors at this level: they end up in the
/// response envelope.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The query was empty or whitespace. Nothing was sent to the model.
    #[error("query is empty")]
    EmptyQuery,
}

pub type Result<T> = std::result::Result<T, Error>;
