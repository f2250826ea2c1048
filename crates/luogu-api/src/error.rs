//! Error types for endpoint wrappers

/// Errors from endpoint wrappers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] session::Error),

    #[error("schema error: {0}")]
    Schema(#[from] schema::Error),

    /// The payload decoded but lacks a field the wrapper needs.
    #[error("unexpected payload from {endpoint}: {detail}")]
    UnexpectedPayload { endpoint: String, detail: String },

    #[error("no _uid cookie; not logged in")]
    NotLoggedIn,
}

/// Result alias for wrapper calls.
pub type Result<T> = std::result::Result<T, Error>;
