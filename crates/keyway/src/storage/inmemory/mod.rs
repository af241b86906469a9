//! In-memory storage backend for testing.
//!
//! Stores every registered table as a list of items behind an
//! `Arc<RwLock<_>>` and evaluates read requests the way DynamoDB pages them.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyway::storage::inmemory::InMemoryBackend;
//!
//! let backend = InMemoryBackend::new().with_schema(Assignment::schema(), "dev")?;
//! // Use backend for testing...
//! ```

mod backend;

pub use backend::InMemoryBackend;
