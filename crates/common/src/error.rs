//! Configuration and persistence errors shared across crates

use thiserror::Error;

/// Common error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("max_retries must be greater than 0".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: max_retries must be greater than 0"
        );

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "cookies.json",
        ));
        assert!(
            io_err.to_string().starts_with("I/O error:"),
            "got: {}",
            io_err
        );
    }

    #[test]
    fn json_errors_convert() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Json(_)));
    }
}
