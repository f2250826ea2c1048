//! Error taxonomy for session calls

/// Classified outcome of a failed call.
///
/// Transient signals (rate limiting, timeouts, stale tokens) are absorbed by
/// the retry loop; callers only see `RateLimitExceeded` as the `last` cause of
/// `RetriesExhausted`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication required: {0}")]
    Authentication(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("challenge required and no solver configured")]
    ChallengeRequired,

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("schema error: {0}")]
    Schema(#[from] schema::Error),

    #[error("configuration error: {0}")]
    Config(#[from] common::Error),
}

impl Error {
    /// Whether the failure class is retried inside the session.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RateLimitExceeded(_))
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Authentication(_) => "authentication",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::RateLimitExceeded(_) => "rate_limited",
            Error::ChallengeRequired => "challenge_required",
            Error::Server { .. } => "server",
            Error::Request(_) => "request",
            Error::RetriesExhausted { .. } => "retries_exhausted",
            Error::Schema(_) => "schema",
            Error::Config(_) => "config",
        }
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limit_is_transient() {
        assert!(Error::RateLimitExceeded("429".into()).is_transient());
        assert!(!Error::Server { status: 502 }.is_transient());
        assert!(!Error::ChallengeRequired.is_transient());
        assert!(
            !Error::RetriesExhausted {
                attempts: 5,
                last: Box::new(Error::RateLimitExceeded("429".into())),
            }
            .is_transient()
        );
    }

    #[test]
    fn retries_exhausted_display_includes_cause() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::RateLimitExceeded("HTTP 429".into())),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 3 attempts: rate limit exceeded: HTTP 429"
        );
    }

    #[test]
    fn schema_errors_convert() {
        let err: Error = schema::Error::UnknownSchema("Contest".into()).into();
        assert_eq!(err.kind(), "schema");
    }
}
