//! Generic per-entity table component.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::{Stream, StreamExt};

use keyway_core::cursor::Cursor;
use keyway_core::query::{plan, plan_scan, QueryInput, QueryPlan, ScanInput};
use keyway_core::schema::EntitySchema;
use keyway_core::storage::{Backend, Condition, Result, StoreError, WriteOutcome, WriteRequest};
use keyway_core::value::Item;

use crate::engine::{self, Completion, PageOptions, RateLimiter};
use crate::entity::Entity;

/// DynamoDB accepts at most 25 requests per batch write.
pub const BATCH_WRITE_SIZE: usize = 25;

/// Retry policy for the unprocessed part of a batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Attempts per chunk, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each one after.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl BatchPolicy {
    fn delay(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff)
    }
}

/// Typed access to one entity's table and its secondary indexes.
pub struct Table<E> {
    backend: Arc<dyn Backend>,
    name: String,
    page_size: Option<usize>,
    batch: BatchPolicy,
    limiter: Option<Arc<dyn RateLimiter>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            name: self.name.clone(),
            page_size: self.page_size,
            batch: self.batch,
            limiter: self.limiter.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Table<E> {
    pub fn new(backend: Arc<dyn Backend>, prefix: &str) -> Self {
        Self {
            backend,
            name: E::schema().table_name(prefix),
            page_size: None,
            batch: BatchPolicy::default(),
            limiter: None,
            _entity: PhantomData,
        }
    }

    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_batch_policy(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }

    /// Pace item dispatch for every query and scan on this table.
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Resolved (prefixed) table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &'static EntitySchema {
        E::schema()
    }

    /// Logical item plus every derivable composite key attribute.
    fn prepare(&self, entity: &E) -> Result<Item> {
        let mut item = entity.to_item();
        self.schema().materialize_keys(&mut item)?;
        Ok(item)
    }

    fn options(&self) -> PageOptions {
        PageOptions {
            page_size: self.page_size,
            limiter: self.limiter.clone(),
        }
    }

    /// Creates the item, failing with `AlreadyExists` if its key is taken.
    pub async fn save(&self, entity: &E) -> Result<()> {
        let schema = self.schema();
        let item = self.prepare(entity)?;
        let key = schema.describe_key(&item);
        let condition = Condition::AttributeNotExists(schema.primary.partition.name.clone());

        match self.backend.put_item(&self.name, item, Some(condition)).await? {
            WriteOutcome::Written => {
                tracing::debug!(table = %self.name, key = %key, "Saved item");
                Ok(())
            }
            WriteOutcome::ConditionFailed => Err(StoreError::AlreadyExists {
                entity: schema.entity,
                key,
            }),
        }
    }

    /// Writes the item, replacing any existing one.
    pub async fn put(&self, entity: &E) -> Result<()> {
        let item = self.prepare(entity)?;
        self.backend.put_item(&self.name, item, None).await?;
        Ok(())
    }

    /// Reads one item by the logical values of its primary key.
    pub async fn get(&self, key: &Item) -> Result<E> {
        let schema = self.schema();
        let physical = schema.primary_key(key)?;

        match self.backend.get_item(&self.name, &physical, true).await? {
            Some(mut item) => {
                schema.recover_logical(&mut item)?;
                E::from_item(&item)
            }
            None => Err(StoreError::NotFound {
                entity: schema.entity,
                key: schema.describe_key(key),
            }),
        }
    }

    /// Removes one item. Removing a missing item succeeds.
    pub async fn delete(&self, key: &Item) -> Result<()> {
        let physical = self.schema().primary_key(key)?;
        self.backend.delete_item(&self.name, &physical).await
    }

    /// Resume position just after `entity` on the given traversal.
    pub fn cursor_for(&self, entity: &E, index: Option<&str>, descending: bool) -> Result<Cursor> {
        let view = self.schema().view(index)?;
        Cursor::from_item(&view, &entity.to_item(), descending)
    }

    fn plan_query(&self, input: &QueryInput) -> Result<QueryPlan> {
        plan(self.schema(), &self.name, input)
    }

    fn plan_scan(&self, input: &ScanInput) -> Result<QueryPlan> {
        plan_scan(self.schema(), &self.name, input)
    }

    /// Item decoder for the traversal `plan` reads from.
    fn decoder(plan: &QueryPlan) -> Result<impl Fn(Item) -> Result<E> + Send + 'static> {
        let keys_only = E::schema().view(plan.request.index.as_deref())?.keys_only();
        Ok(move |mut item: Item| {
            E::schema().recover_logical(&mut item)?;
            if keys_only {
                E::from_keys(&item)
            } else {
                E::from_item(&item)
            }
        })
    }

    /// Runs a query, handing each item to `on_item` until it returns `false`.
    pub async fn query<C>(&self, input: &QueryInput, on_item: C) -> Result<Completion>
    where
        C: FnMut(E, bool) -> bool,
    {
        let plan = self.plan_query(input)?;
        let decode = Self::decoder(&plan)?;
        engine::iterate(self.backend.clone(), plan, self.options(), decode, on_item).await
    }

    /// Stream form of [`Table::query`]. Validation errors surface here,
    /// before anything is fetched.
    pub fn query_stream(
        &self,
        input: &QueryInput,
    ) -> Result<impl Stream<Item = Result<(E, bool)>> + Send> {
        let plan = self.plan_query(input)?;
        let decode = Self::decoder(&plan)?;
        Ok(engine::stream(self.backend.clone(), plan, self.options(), decode))
    }

    /// Collects every item a query yields.
    pub async fn query_all(&self, input: &QueryInput) -> Result<Vec<E>> {
        self.query_stream(input)?
            .map(|next| next.map(|(entity, _)| entity))
            .collect::<Result<Vec<E>>>()
            .await
    }

    /// Scans the table or one index.
    pub async fn scan<C>(&self, input: &ScanInput, on_item: C) -> Result<Completion>
    where
        C: FnMut(E, bool) -> bool,
    {
        let plan = self.plan_scan(input)?;
        let decode = Self::decoder(&plan)?;
        engine::iterate(self.backend.clone(), plan, self.options(), decode, on_item).await
    }

    pub fn scan_stream(
        &self,
        input: &ScanInput,
    ) -> Result<impl Stream<Item = Result<(E, bool)>> + Send> {
        let plan = self.plan_scan(input)?;
        let decode = Self::decoder(&plan)?;
        Ok(engine::stream(self.backend.clone(), plan, self.options(), decode))
    }

    /// Writes many items, overwriting existing ones.
    pub async fn batch_save(&self, entities: &[E]) -> Result<()> {
        let requests = entities
            .iter()
            .map(|entity| self.prepare(entity).map(WriteRequest::Put))
            .collect::<Result<Vec<_>>>()?;
        self.batch_write(requests).await
    }

    /// Removes many items by the logical values of their primary keys.
    pub async fn batch_delete(&self, keys: &[Item]) -> Result<()> {
        let schema = self.schema();
        let requests = keys
            .iter()
            .map(|key| schema.primary_key(key).map(WriteRequest::Delete))
            .collect::<Result<Vec<_>>>()?;
        self.batch_write(requests).await
    }

    /// Submits requests in chunks, retrying only what the backend left
    /// unprocessed.
    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        for chunk in requests.chunks(BATCH_WRITE_SIZE) {
            let mut pending = chunk.to_vec();
            let mut attempt = 1;

            loop {
                pending = self.backend.batch_write(&self.name, pending).await?;
                if pending.is_empty() {
                    break;
                }
                if attempt >= self.batch.max_attempts {
                    return Err(StoreError::retryable(format!(
                        "{} items still unprocessed in {} after {} attempts",
                        pending.len(),
                        self.name,
                        attempt
                    )));
                }

                let delay = self.batch.delay(attempt - 1);
                tracing::warn!(
                    table = %self.name,
                    unprocessed = pending.len(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying unprocessed batch items"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
        Ok(())
    }
}
