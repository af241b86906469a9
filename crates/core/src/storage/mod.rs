mod classify;
mod error;
mod traits;
mod types;

pub use classify::{error_kind, is_retryable, ErrorKind};
pub use error::{Result, StoreError};
pub use traits::Backend;
pub use types::{Condition, Page, WriteOutcome, WriteRequest};
