//! Pure functions for classifying storage errors.
//!
//! Callers use these to decide whether a failure was their own fault, an
//! expected outcome of a conditional read/write, or something worth retrying.

use super::StoreError;

/// Coarse category of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller's fault; no I/O was attempted.
    Validation,
    /// Table or index does not exist.
    Schema,
    /// Conditional write found an existing item.
    Conflict,
    /// Item does not exist.
    NotFound,
    /// Stored data could not be decoded.
    Decode,
    /// Failure reported by the backend or the rate limiter.
    Backend,
}

/// Maps a [`StoreError`] to its [`ErrorKind`].
///
/// - `Validation`, `InvalidArgument` -> `Validation`
/// - `Schema` -> `Schema`
/// - `AlreadyExists` -> `Conflict`
/// - `NotFound` -> `NotFound`
/// - `CorruptKey`, `Decode` -> `Decode`
/// - `Backend`, `RateLimiter` -> `Backend`
pub fn error_kind(error: &StoreError) -> ErrorKind {
    match error {
        StoreError::Validation { .. } | StoreError::InvalidArgument(_) => ErrorKind::Validation,
        StoreError::Schema(_) => ErrorKind::Schema,
        StoreError::AlreadyExists { .. } => ErrorKind::Conflict,
        StoreError::NotFound { .. } => ErrorKind::NotFound,
        StoreError::CorruptKey { .. } | StoreError::Decode(_) => ErrorKind::Decode,
        StoreError::Backend { .. } | StoreError::RateLimiter(_) => ErrorKind::Backend,
    }
}

/// Whether retrying the same call may succeed.
///
/// Only backend failures flagged as transient qualify.
pub fn is_retryable(error: &StoreError) -> bool {
    matches!(
        error,
        StoreError::Backend {
            retryable: true,
            ..
        }
    )
}
