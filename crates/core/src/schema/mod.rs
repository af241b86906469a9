//! Entity schema descriptors.
//!
//! A schema is plain data: attribute declarations, the primary key and any
//! secondary indexes. The engine consumes it as configuration.

mod types;
mod view;

pub use types::{
    AttributeDef, CompositeSpec, EmptyParts, EntitySchema, IndexSchema, KeyAttribute, KeySchema,
    Projection, ScalarType, Throughput,
};
pub use view::IndexView;
