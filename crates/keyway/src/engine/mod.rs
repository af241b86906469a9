//! Generic pagination engine: one implementation for every entity and index.

mod iterator;
mod limiter;

pub use iterator::{iterate, stream, Completion, PageOptions};
pub use limiter::{IntervalLimiter, RateLimiter};
