use async_trait::async_trait;

use crate::query::ReadRequest;
use crate::value::Item;

use super::{Condition, Page, Result, WriteOutcome, WriteRequest};

/// Key-value storage backend.
///
/// The only I/O dependency of the engine. Implementations translate
/// resource-not-found conditions into [`super::StoreError::Schema`] and every
/// other failure into [`super::StoreError::Backend`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Writes an item, honouring an optional condition.
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome>;

    /// Reads one item by its physical primary key.
    async fn get_item(&self, table: &str, key: &Item, consistent: bool) -> Result<Option<Item>>;

    /// Removes an item. Removing a missing item is not an error.
    async fn delete_item(&self, table: &str, key: &Item) -> Result<()>;

    /// Fetches one page of a keyed query.
    async fn query(&self, request: &ReadRequest) -> Result<Page>;

    /// Fetches one page of a full table or index scan.
    async fn scan(&self, request: &ReadRequest) -> Result<Page>;

    /// Submits a batch of puts and deletes against one table.
    ///
    /// Returns the subset the backend did not process.
    async fn batch_write(&self, table: &str, requests: Vec<WriteRequest>)
        -> Result<Vec<WriteRequest>>;
}
