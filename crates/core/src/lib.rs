//! Functional core for keyway.
//!
//! Everything in this crate is pure: attribute values, entity schemas, the
//! composite key codec, resume cursors and the query planner. The only I/O
//! seam is the [`storage::Backend`] trait, implemented by the `keyway` crate.

pub mod cursor;
pub mod key;
pub mod query;
pub mod schema;
pub mod storage;
pub mod value;

pub use cursor::Cursor;
pub use query::{Filter, QueryInput, QueryPlan, ScanInput};
pub use schema::{EntitySchema, IndexView};
pub use storage::{Backend, Result, StoreError};
pub use value::{AttrValue, Item};
