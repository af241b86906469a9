//! Storage backend implementations.
//!
//! This module provides concrete implementations of the `Backend` trait
//! defined in `keyway_core::storage`. The implementations are selected at
//! compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): In-memory backend with DynamoDB paging semantics
//! - `dynamodb`: AWS DynamoDB backend using `aws-sdk-dynamodb`
//!
//! Both may be enabled together; the in-memory backend is meant for tests.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p keyway --features dynamodb
//! ```

// Compile-time check that at least one backend is available
#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p keyway --features dynamodb"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbBackend;
