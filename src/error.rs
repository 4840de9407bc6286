//! Error types for the crate.

use thiserror::Error;

/// Top-level error type for dataset handling, resampling and model fitting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("{0} must be fitted before use")]
    NotFitted(&'static str),

    #[error("Resampling error: {0}")]
    Resampling(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn resampling(msg: impl Into<String>) -> Self {
        Self::Resampling(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::shape("3 rows vs 4 labels");
        assert_eq!(err.to_string(), "Shape mismatch: 3 rows vs 4 labels");

        let err = Error::NotFitted("RandomForest");
        assert_eq!(err.to_string(), "RandomForest must be fitted before use");

        let err = Error::resampling("no neighbours");
        assert_eq!(err.to_string(), "Resampling error: no neighbours");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
