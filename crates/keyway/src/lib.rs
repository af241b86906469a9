//! Imperative shell for keyway.
//!
//! Typed tables over DynamoDB: composite keys, secondary index queries,
//! cursor pagination and batch writes. Pure planning lives in `keyway_core`;
//! this crate owns the I/O: the page iterator, backends and configuration.

mod config;
mod db;
pub mod engine;
mod entity;
pub mod storage;
mod table;

#[cfg(all(test, feature = "inmemory"))]
mod fixtures;

pub use config::{AwsConfig, Config};
pub use db::Db;
pub use engine::{Completion, IntervalLimiter, PageOptions, RateLimiter};
pub use entity::Entity;
pub use table::{BatchPolicy, Table, BATCH_WRITE_SIZE};

pub use keyway_core::{
    cursor::Cursor,
    query::{Filter, QueryInput, ScanInput},
    schema::{
        CompositeSpec, EmptyParts, EntitySchema, IndexSchema, KeyAttribute, KeySchema, Projection,
        ScalarType,
    },
    storage::{Backend, Result, StoreError},
    value::{AttrValue, Item},
};
