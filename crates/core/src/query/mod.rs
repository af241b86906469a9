//! Query planning: logical lookups to backend read requests.

mod filter;
mod planner;
mod request;

pub use filter::Filter;
pub use planner::{plan, plan_scan, QueryInput, QueryPlan, ScanInput};
pub use request::{KeyCondition, KeyTerm, ReadRequest, Rendered, SortBound, SortOp};
