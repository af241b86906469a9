//! In-memory backend implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use keyway_core::query::ReadRequest;
use keyway_core::schema::{EntitySchema, Projection};
use keyway_core::storage::{
    Backend, Condition, Page, Result, StoreError, WriteOutcome, WriteRequest,
};
use keyway_core::value::Item;

/// Physical key attribute names of the table or one index.
#[derive(Debug, Clone)]
struct KeyNames {
    partition: String,
    sort: Option<String>,
}

impl KeyNames {
    fn names(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.partition).chain(self.sort.iter())
    }
}

#[derive(Debug, Clone)]
struct IndexDef {
    key: KeyNames,
    keys_only: bool,
}

#[derive(Debug, Clone)]
struct TableData {
    primary: KeyNames,
    indexes: HashMap<String, IndexDef>,
    items: Vec<Item>,
}

impl TableData {
    fn from_schema(schema: &EntitySchema) -> Self {
        let names = |key: &keyway_core::schema::KeySchema| KeyNames {
            partition: key.partition.name.clone(),
            sort: key.sort.as_ref().map(|s| s.name.clone()),
        };
        Self {
            primary: names(&schema.primary),
            indexes: schema
                .indexes
                .iter()
                .map(|index| {
                    let def = IndexDef {
                        key: names(&index.key),
                        keys_only: index.projection == Projection::KeysOnly,
                    };
                    (index.name.clone(), def)
                })
                .collect(),
            items: Vec::new(),
        }
    }

    fn primary_key(&self, item: &Item) -> Result<Item> {
        self.primary
            .names()
            .map(|name| match item.get(name) {
                Some(value) if !value.is_null() => Ok((name.clone(), value.clone())),
                _ => Err(StoreError::backend(format!(
                    "One of the required keys was not given a value: {}",
                    name
                ))),
            })
            .collect()
    }

    fn position(&self, key: &Item) -> Option<usize> {
        self.items.iter().position(|item| {
            key.iter().all(|(name, value)| {
                item.get(name).and_then(|v| v.compare(value)) == Some(Ordering::Equal)
            })
        })
    }

    /// Attribute names that order a traversal: its own key, then the
    /// primary key as a tie-break.
    fn ordering(&self, index: Option<&IndexDef>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let traversal = index.map(|i| &i.key).unwrap_or(&self.primary);
        for name in traversal.names().chain(self.primary.names()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

fn compare_by(names: &[String], a: &Item, b: &Item) -> Ordering {
    for name in names {
        let ordering = match (a.get(name), b.get(name)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// In-memory storage backend for testing.
///
/// Tables are registered from an [`EntitySchema`] and evaluated with the
/// same paging rules as DynamoDB: `Limit` counts evaluated items before
/// filtering, and a page cut by the limit carries a last evaluated key even
/// when nothing follows it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<HashMap<String, TableData>>>,
    max_page_size: Option<usize>,
    unprocessed: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryBackend {
    /// Creates a new backend with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty table for `schema` under its prefixed name.
    ///
    /// Fails while another handle holds the table lock; use
    /// [`InMemoryBackend::create_table`] once the backend is in use.
    pub fn with_schema(self, schema: &EntitySchema, prefix: &str) -> Result<Self> {
        let name = schema.table_name(prefix);
        {
            let mut tables = self.tables.try_write().map_err(|_| {
                StoreError::backend(format!(
                    "cannot register table {} while the backend is in use",
                    name
                ))
            })?;
            tables.insert(name, TableData::from_schema(schema));
        }
        Ok(self)
    }

    /// Registers an empty table for `schema`, replacing any existing one.
    pub async fn create_table(&self, schema: &EntitySchema, prefix: &str) {
        let mut tables = self.tables.write().await;
        tables.insert(schema.table_name(prefix), TableData::from_schema(schema));
    }

    /// Caps every page, the way DynamoDB caps a page at 1 MB.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = Some(size.max(1));
        self
    }

    /// The next `count` batch write requests come back unprocessed.
    pub fn fail_batch_items(&self, count: usize) {
        self.unprocessed.store(count, AtomicOrdering::SeqCst);
    }

    /// Number of query and scan pages served so far.
    pub fn read_requests(&self) -> usize {
        self.reads.load(AtomicOrdering::SeqCst)
    }

    /// Number of items stored in `table`.
    pub async fn item_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.items.len()).unwrap_or(0)
    }

    async fn read_page(&self, request: &ReadRequest) -> Result<Page> {
        self.reads.fetch_add(1, AtomicOrdering::SeqCst);

        let tables = self.tables.read().await;
        let table = tables.get(&request.table).ok_or_else(|| missing_table(&request.table))?;
        let index = match &request.index {
            Some(name) => Some(table.indexes.get(name).ok_or_else(|| {
                StoreError::Schema(format!(
                    "index {} does not exist on table {}",
                    name, request.table
                ))
            })?),
            None => None,
        };
        if index.is_some() && request.consistent_read {
            return Err(StoreError::backend(
                "Consistent reads are not supported on global secondary indexes",
            ));
        }

        let traversal = index.map(|i| &i.key).unwrap_or(&table.primary);
        let ordering = table.ordering(index);

        let mut candidates: Vec<&Item> = table
            .items
            .iter()
            // Sparse indexes only hold items carrying every index key attribute.
            .filter(|item| traversal.names().all(|name| item.contains_key(name)))
            .filter(|item| {
                request
                    .key_condition
                    .as_ref()
                    .map(|condition| condition.matches(item))
                    .unwrap_or(true)
            })
            .collect();
        candidates.sort_by(|a, b| compare_by(&ordering, a, b));
        if !request.scan_forward {
            candidates.reverse();
        }

        if let Some(start) = &request.exclusive_start_key {
            let past = if request.scan_forward {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            candidates.retain(|item| compare_by(&ordering, item, start) == past);
        }

        let cap = match (request.limit, self.max_page_size) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (limit, max) => limit.or(max),
        };
        let evaluated: Vec<&Item> = match cap {
            Some(cap) => candidates.into_iter().take(cap).collect(),
            None => candidates,
        };

        let last_evaluated_key = match (cap, evaluated.last()) {
            (Some(cap), Some(last)) if evaluated.len() == cap => Some(
                ordering
                    .iter()
                    .filter_map(|name| last.get(name).map(|v| (name.clone(), v.clone())))
                    .collect(),
            ),
            _ => None,
        };

        let items = evaluated
            .into_iter()
            .filter(|item| request.filters.iter().all(|f| f.matches(item)))
            .map(|item| match index {
                Some(def) if def.keys_only => ordering
                    .iter()
                    .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
                    .collect(),
                _ => item.clone(),
            })
            .collect();

        Ok(Page {
            items,
            last_evaluated_key,
        })
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::Schema(format!("Requested resource not found: table {}", table))
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome> {
        let mut tables = self.tables.write().await;
        let data = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let key = data.primary_key(&item)?;

        match data.position(&key) {
            Some(existing) => {
                if let Some(Condition::AttributeNotExists(name)) = &condition {
                    if data.items[existing].contains_key(name) {
                        return Ok(WriteOutcome::ConditionFailed);
                    }
                }
                data.items[existing] = item;
            }
            None => data.items.push(item),
        }
        Ok(WriteOutcome::Written)
    }

    async fn get_item(&self, table: &str, key: &Item, _consistent: bool) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        let data = tables.get(table).ok_or_else(|| missing_table(table))?;
        let key = data.primary_key(key)?;
        Ok(data.position(&key).map(|i| data.items[i].clone()))
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        let mut tables = self.tables.write().await;
        let data = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let key = data.primary_key(key)?;
        if let Some(position) = data.position(&key) {
            data.items.remove(position);
        }
        Ok(())
    }

    async fn query(&self, request: &ReadRequest) -> Result<Page> {
        if request.key_condition.is_none() {
            return Err(StoreError::backend(
                "Query requires a key condition expression",
            ));
        }
        self.read_page(request).await
    }

    async fn scan(&self, request: &ReadRequest) -> Result<Page> {
        self.read_page(request).await
    }

    async fn batch_write(
        &self,
        table: &str,
        mut requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>> {
        let rejected = self
            .unprocessed
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |left| {
                Some(left.saturating_sub(requests.len()))
            })
            .unwrap_or(0)
            .min(requests.len());
        let unprocessed = requests.split_off(requests.len() - rejected);

        let mut tables = self.tables.write().await;
        let data = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        for request in requests {
            match request {
                WriteRequest::Put(item) => {
                    let key = data.primary_key(&item)?;
                    match data.position(&key) {
                        Some(existing) => data.items[existing] = item,
                        None => data.items.push(item),
                    }
                }
                WriteRequest::Delete(key) => {
                    let key = data.primary_key(&key)?;
                    if let Some(position) = data.position(&key) {
                        data.items.remove(position);
                    }
                }
            }
        }

        Ok(unprocessed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_core::query::{plan, plan_scan, Filter, QueryInput, ScanInput};
    use keyway_core::schema::{IndexSchema, KeyAttribute, KeySchema, ScalarType};
    use keyway_core::value::AttrValue;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "Assignment",
            "assignments",
            KeySchema::hash_range(
                KeyAttribute::scalar("name", ScalarType::String),
                KeyAttribute::scalar("version", ScalarType::Number),
            ),
        )
        .index(
            IndexSchema::new(
                "byState",
                KeySchema::hash_range(
                    KeyAttribute::scalar("state", ScalarType::String),
                    KeyAttribute::scalar("version", ScalarType::Number),
                ),
            )
            .keys_only(),
        )
    }

    fn record(name: &str, version: i64, state: Option<&str>) -> Item {
        let mut item: Item = [
            ("name".to_string(), AttrValue::s(name)),
            ("version".to_string(), AttrValue::n(version)),
            ("payload".to_string(), AttrValue::s("data")),
        ]
        .into_iter()
        .collect();
        if let Some(state) = state {
            item.insert("state".to_string(), AttrValue::s(state));
        }
        item
    }

    async fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new().with_schema(&schema(), "").unwrap();
        for version in [3, 1, 10, 2] {
            backend
                .put_item("assignments", record("h1", version, Some("open")), None)
                .await
                .unwrap();
        }
        backend
            .put_item("assignments", record("h2", 1, None), None)
            .await
            .unwrap();
        backend
    }

    fn versions(page: &Page) -> Vec<String> {
        page.items
            .iter()
            .map(|item| item["version"].as_n().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_table_is_schema_error() {
        let backend = InMemoryBackend::new();
        let result = backend.get_item("missing", &Item::new(), true).await;
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[tokio::test]
    async fn test_register_while_locked_is_an_error() {
        let backend = InMemoryBackend::new();
        let guard = backend.tables.read().await;
        let result = backend.clone().with_schema(&schema(), "");
        assert!(matches!(
            result,
            Err(StoreError::Backend {
                retryable: false,
                ..
            })
        ));
        drop(guard);

        let backend = backend.with_schema(&schema(), "").unwrap();
        assert_eq!(backend.item_count("assignments").await, 0);
        backend
            .put_item("assignments", record("h1", 1, None), None)
            .await
            .unwrap();
        assert_eq!(backend.item_count("assignments").await, 1);
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let backend = InMemoryBackend::new().with_schema(&schema(), "").unwrap();
        let condition = || Some(Condition::AttributeNotExists("name".to_string()));

        let first = backend
            .put_item("assignments", record("a", 1, None), condition())
            .await
            .unwrap();
        let second = backend
            .put_item("assignments", record("a", 1, None), condition())
            .await
            .unwrap();

        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::ConditionFailed);
        assert_eq!(backend.item_count("assignments").await, 1);
    }

    #[tokio::test]
    async fn test_query_orders_numerically() {
        let backend = seeded().await;
        let schema = schema();
        let plan = plan(&schema, "assignments", &QueryInput::table().hash("name", "h1")).unwrap();

        let page = backend.query(&plan.request).await.unwrap();
        assert_eq!(versions(&page), vec!["1", "2", "3", "10"]);
        assert!(page.is_final());
    }

    #[tokio::test]
    async fn test_query_limit_sets_last_evaluated_key() {
        let backend = seeded().await;
        let schema = schema();
        let mut request = plan(&schema, "assignments", &QueryInput::table().hash("name", "h1").descending())
            .unwrap()
            .request;
        request.limit = Some(4);

        let page = backend.query(&request).await.unwrap();
        assert_eq!(versions(&page), vec!["10", "3", "2", "1"]);
        // Cut by the limit, so a continuation is reported even though nothing follows.
        let start = page.last_evaluated_key.unwrap();
        assert_eq!(start["version"], AttrValue::n(1));

        request.exclusive_start_key = Some(start);
        let next = backend.query(&request).await.unwrap();
        assert!(next.items.is_empty());
        assert!(next.is_final());
    }

    #[tokio::test]
    async fn test_filter_applies_after_limit() {
        let backend = seeded().await;
        backend
            .put_item("assignments", record("h1", 4, Some("closed")), None)
            .await
            .unwrap();
        let schema = schema();
        let input = QueryInput::table()
            .hash("name", "h1")
            .filter(Filter::eq("state", AttrValue::s("closed")));
        let mut request = plan(&schema, "assignments", &input).unwrap().request;
        request.limit = Some(2);

        let page = backend.query(&request).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.last_evaluated_key.is_some());
    }

    #[tokio::test]
    async fn test_keys_only_sparse_index() {
        let backend = seeded().await;
        let schema = schema();
        let plan = plan_scan(&schema, "assignments", &ScanInput::on_index("byState")).unwrap();

        let page = backend.scan(&plan.request).await.unwrap();
        // h2 has no state, so it is not in the index.
        assert_eq!(page.items.len(), 4);
        assert!(page.items.iter().all(|item| !item.contains_key("payload")));
        assert_eq!(backend.read_requests(), 1);
    }

    #[tokio::test]
    async fn test_consistent_index_read_rejected() {
        let backend = seeded().await;
        let schema = schema();
        let mut request = plan_scan(&schema, "assignments", &ScanInput::on_index("byState"))
            .unwrap()
            .request;
        request.consistent_read = true;
        assert!(matches!(
            backend.scan(&request).await,
            Err(StoreError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn test_max_page_size() {
        let backend = seeded().await.with_max_page_size(3);
        let schema = schema();
        let request = plan_scan(&schema, "assignments", &ScanInput::table())
            .unwrap()
            .request;

        let page = backend.scan(&request).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(!page.is_final());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let backend = seeded().await;
        let key = record("nobody", 1, None);
        backend.delete_item("assignments", &key).await.unwrap();
        backend.delete_item("assignments", &key).await.unwrap();
        assert_eq!(backend.item_count("assignments").await, 5);
    }

    #[tokio::test]
    async fn test_batch_write_returns_unprocessed() {
        let backend = InMemoryBackend::new().with_schema(&schema(), "").unwrap();
        backend.fail_batch_items(2);

        let requests: Vec<WriteRequest> = (1..=5)
            .map(|v| WriteRequest::Put(record("b", v, None)))
            .collect();
        let unprocessed = backend.batch_write("assignments", requests).await.unwrap();
        assert_eq!(unprocessed.len(), 2);
        assert_eq!(backend.item_count("assignments").await, 3);

        let retried = backend.batch_write("assignments", unprocessed).await.unwrap();
        assert!(retried.is_empty());
        assert_eq!(backend.item_count("assignments").await, 5);
    }
}
