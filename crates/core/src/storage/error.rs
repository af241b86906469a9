use thiserror::Error;

/// Errors that can occur while planning or executing storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid value for {attribute} ({value:?}): {reason}")]
    Validation {
        attribute: String,
        value: String,
        reason: String,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("Corrupt key {attribute} ({value:?}): expected {expected} parts, found {found}")]
    CorruptKey {
        attribute: String,
        value: String,
        expected: usize,
        found: usize,
    },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Backend error: {message}")]
    Backend { message: String, retryable: bool },
    #[error("Rate limiter error: {0}")]
    RateLimiter(String),
}

impl StoreError {
    /// Shorthand for a non-retryable backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: false,
        }
    }

    /// Shorthand for a backend failure the caller may retry (throttling, 5xx).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    pub(crate) fn validation(
        attribute: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
