//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the `Backend`
//! trait using `aws-sdk-dynamodb`. Tables and indexes must already exist.

mod backend;
mod client;
mod conversions;
mod error;

pub use backend::DynamoDbBackend;
pub use client::create_client;
