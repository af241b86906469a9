//! Page iterator shared by queries and scans.
//!
//! Drives `fetch -> decode -> dispatch` until the backend runs dry, the
//! caller's limit is reached or the caller stops. The tail item of a page
//! that is not known to be final is held back until the next page shows
//! whether anything follows it, so `is_last` is only ever reported for the
//! true final item.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};

use keyway_core::query::QueryPlan;
use keyway_core::storage::{Backend, Result};
use keyway_core::value::Item;

use super::RateLimiter;

/// How an iteration ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The backend has no more matching items.
    Exhausted,
    /// The callback asked to stop.
    Stopped,
    /// The caller's item limit was reached with more items remaining.
    LimitReached,
}

/// Per-call paging knobs.
#[derive(Clone, Default)]
pub struct PageOptions {
    /// Items requested from the backend per round trip.
    pub page_size: Option<usize>,
    pub limiter: Option<Arc<dyn RateLimiter>>,
}

impl std::fmt::Debug for PageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageOptions")
            .field("page_size", &self.page_size)
            .field("limiter", &self.limiter.is_some())
            .finish()
    }
}

/// Stream decoded items paired with their `is_last` flag.
///
/// Nothing is fetched until the stream is polled. Dropping the stream
/// cancels the iteration at its next suspension point.
pub fn stream<E, F>(
    backend: Arc<dyn Backend>,
    plan: QueryPlan,
    options: PageOptions,
    decode: F,
) -> impl Stream<Item = Result<(E, bool)>> + Send
where
    E: Send + 'static,
    F: Fn(Item) -> Result<E> + Send + 'static,
{
    async_stream::try_stream! {
        let QueryPlan { mut request, limit, empty_page_is_terminal } = plan;
        let mut remaining = limit;
        let mut held: Option<E> = None;

        'pages: while remaining != Some(0) {
            // One item beyond what can still be delivered is enough to tell
            // whether the last delivered item is the final one.
            let wanted = remaining.map(|r| {
                r.saturating_sub(usize::from(held.is_some()))
                    .saturating_add(1)
            });
            request.limit = match (options.page_size, wanted) {
                (Some(size), Some(wanted)) => Some(size.min(wanted)),
                (size, wanted) => size.or(wanted),
            };

            let page = if request.is_scan() {
                backend.scan(&request).await?
            } else {
                backend.query(&request).await?
            };

            let fetched = page.items.len();
            let final_page = page.is_final() || (fetched == 0 && empty_page_is_terminal);
            tracing::debug!(
                table = %request.table,
                index = ?request.index,
                items = fetched,
                final_page,
                "Fetched page"
            );

            let decoded = page
                .items
                .into_iter()
                .map(&decode)
                .collect::<Result<Vec<E>>>()?;

            let mut queue: VecDeque<E> = held.take().into_iter().chain(decoded).collect();
            while let Some(entity) = queue.pop_front() {
                let is_tail = queue.is_empty();
                if is_tail && !final_page {
                    held = Some(entity);
                    break;
                }

                if let Some(limiter) = &options.limiter {
                    limiter.wait().await?;
                }
                yield (entity, is_tail && final_page);

                if let Some(left) = remaining.as_mut() {
                    *left -= 1;
                    if *left == 0 {
                        break 'pages;
                    }
                }
            }

            if final_page {
                break;
            }
            request.exclusive_start_key = page.last_evaluated_key;
        }
    }
}

/// Callback form: `on_item(entity, is_last)` returns whether to continue.
pub async fn iterate<E, F, C>(
    backend: Arc<dyn Backend>,
    plan: QueryPlan,
    options: PageOptions,
    decode: F,
    mut on_item: C,
) -> Result<Completion>
where
    E: Send + 'static,
    F: Fn(Item) -> Result<E> + Send + 'static,
    C: FnMut(E, bool) -> bool,
{
    let limit = plan.limit;
    let items = stream(backend, plan, options, decode);
    tokio::pin!(items);

    let mut delivered = 0;
    let mut reached_end = false;
    while let Some(next) = items.next().await {
        let (entity, is_last) = next?;
        delivered += 1;
        reached_end = is_last;
        if !on_item(entity, is_last) {
            return Ok(Completion::Stopped);
        }
    }

    match limit {
        Some(limit) if delivered >= limit && !reached_end => Ok(Completion::LimitReached),
        _ => Ok(Completion::Exhausted),
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::storage::inmemory::InMemoryBackend;
    use keyway_core::query::{plan, plan_scan, Filter, QueryInput, ScanInput};
    use keyway_core::schema::{EntitySchema, KeyAttribute, KeySchema, ScalarType};
    use keyway_core::storage::StoreError;
    use keyway_core::value::{get_number, AttrValue};

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "Reading",
            "readings",
            KeySchema::hash_range(
                KeyAttribute::scalar("sensor", ScalarType::String),
                KeyAttribute::scalar("seq", ScalarType::Number),
            ),
        )
    }

    async fn backend_with(count: i64) -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::new().with_schema(&schema(), "").unwrap();
        for seq in 1..=count {
            let item: Item = [
                ("sensor".to_string(), AttrValue::s("h1")),
                ("seq".to_string(), AttrValue::n(seq)),
                ("kind".to_string(), AttrValue::s(if seq % 3 == 0 { "odd" } else { "even" })),
            ]
            .into_iter()
            .collect();
            backend.put_item("readings", item, None).await.unwrap();
        }
        Arc::new(backend)
    }

    fn decode(item: Item) -> Result<i64> {
        get_number(&item, "seq")
    }

    async fn collect(
        backend: Arc<InMemoryBackend>,
        input: QueryInput,
        page_size: Option<usize>,
    ) -> (Vec<(i64, bool)>, Completion) {
        let schema = schema();
        let plan = plan(&schema, "readings", &input).unwrap();
        let options = PageOptions {
            page_size,
            limiter: None,
        };
        let mut seen = Vec::new();
        let completion = iterate(backend, plan, options, decode, |seq, is_last| {
            seen.push((seq, is_last));
            true
        })
        .await
        .unwrap();
        (seen, completion)
    }

    #[tokio::test]
    async fn test_limit_below_total_marks_nothing_last() {
        let backend = backend_with(5).await;
        let (seen, completion) =
            collect(backend, QueryInput::table().hash("sensor", "h1").limit(2), None).await;

        assert_eq!(seen, vec![(1, false), (2, false)]);
        assert_eq!(completion, Completion::LimitReached);
    }

    #[tokio::test]
    async fn test_limit_equal_to_total_marks_final_item() {
        let backend = backend_with(5).await;
        let (seen, completion) =
            collect(backend, QueryInput::table().hash("sensor", "h1").limit(5), Some(2)).await;

        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&(5, true)));
        assert!(seen[..4].iter().all(|(_, last)| !last));
        assert_eq!(completion, Completion::Exhausted);
    }

    #[tokio::test]
    async fn test_limit_above_total() {
        let backend = backend_with(3).await;
        let (seen, completion) =
            collect(backend, QueryInput::table().hash("sensor", "h1").limit(10), None).await;

        assert_eq!(seen, vec![(1, false), (2, false), (3, true)]);
        assert_eq!(completion, Completion::Exhausted);
    }

    #[tokio::test]
    async fn test_unbounded_limit_does_not_overflow_page_size() {
        let backend = backend_with(3).await;
        let (seen, completion) = collect(
            backend.clone(),
            QueryInput::table().hash("sensor", "h1").limit(usize::MAX),
            None,
        )
        .await;

        assert_eq!(seen, vec![(1, false), (2, false), (3, true)]);
        assert_eq!(completion, Completion::Exhausted);

        let (seen, _) = collect(
            backend,
            QueryInput::table().hash("sensor", "h1").limit(usize::MAX),
            Some(2),
        )
        .await;
        assert_eq!(seen.last(), Some(&(3, true)));
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_page_boundaries_do_not_mark_last() {
        // Page size 2 over 4 items: the backend reports a continuation after
        // the second page even though it is empty.
        let backend = backend_with(4).await;
        let (seen, _) = collect(backend.clone(), QueryInput::table().hash("sensor", "h1"), Some(2)).await;

        assert_eq!(seen, vec![(1, false), (2, false), (3, false), (4, true)]);
        assert_eq!(backend.read_requests(), 3);
    }

    #[tokio::test]
    async fn test_descending() {
        let backend = backend_with(4).await;
        let input = QueryInput::table()
            .hash("sensor", "h1")
            .starting_at("seq", 3)
            .descending();
        let (seen, _) = collect(backend, input, Some(1)).await;

        assert_eq!(seen, vec![(3, false), (2, false), (1, true)]);
    }

    #[tokio::test]
    async fn test_callback_stop_fetches_nothing_further() {
        let backend = backend_with(6).await;
        let schema = schema();
        let plan = plan(&schema, "readings", &QueryInput::table().hash("sensor", "h1")).unwrap();
        let options = PageOptions {
            page_size: Some(2),
            limiter: None,
        };

        let mut delivered = 0;
        let completion = iterate(backend.clone(), plan, options, decode, |_, _| {
            delivered += 1;
            delivered < 2
        })
        .await
        .unwrap();

        assert_eq!(completion, Completion::Stopped);
        assert_eq!(delivered, 2);
        // Item 2 is held back until the second page proves more follow.
        assert_eq!(backend.read_requests(), 2);
    }

    #[tokio::test]
    async fn test_filtered_empty_pages_keep_paging() {
        let backend = backend_with(7).await;
        let input = QueryInput::table()
            .hash("sensor", "h1")
            .filter(Filter::eq("kind", AttrValue::s("odd")));
        let (seen, completion) = collect(backend, input, Some(1)).await;

        assert_eq!(seen, vec![(3, false), (6, true)]);
        assert_eq!(completion, Completion::Exhausted);
    }

    #[tokio::test]
    async fn test_unfiltered_empty_page_is_terminal() {
        let backend = backend_with(0).await;
        let (seen, completion) = collect(backend.clone(), QueryInput::table().hash("sensor", "h1"), Some(5)).await;

        assert!(seen.is_empty());
        assert_eq!(completion, Completion::Exhausted);
        assert_eq!(backend.read_requests(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_fetches_nothing() {
        let backend = backend_with(3).await;
        let (seen, completion) =
            collect(backend.clone(), QueryInput::table().hash("sensor", "h1").limit(0), None).await;

        assert!(seen.is_empty());
        assert_eq!(completion, Completion::LimitReached);
        assert_eq!(backend.read_requests(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_delivers_nothing_from_page() {
        let backend = backend_with(4).await;
        let schema = schema();
        let plan = plan(&schema, "readings", &QueryInput::table().hash("sensor", "h1")).unwrap();

        let mut seen = 0;
        let result = iterate(
            backend,
            plan,
            PageOptions::default(),
            |item| {
                let seq: i64 = get_number(&item, "seq")?;
                if seq == 3 {
                    return Err(StoreError::Decode("bad reading".to_string()));
                }
                Ok(seq)
            },
            |_, _| {
                seen += 1;
                true
            },
        )
        .await;

        assert_eq!(result, Err(StoreError::Decode("bad reading".to_string())));
        assert_eq!(seen, 0);
    }

    #[tokio::test]
    async fn test_scan_shares_machinery() {
        let backend = backend_with(3).await;
        let schema = schema();
        let plan = plan_scan(&schema, "readings", &ScanInput::table().limit(2)).unwrap();

        let items: Vec<(i64, bool)> = stream(backend, plan, PageOptions::default(), decode)
            .collect::<Result<Vec<_>>>()
            .await
            .unwrap();
        assert_eq!(items, vec![(1, false), (2, false)]);
    }

    struct CountingLimiter(AtomicUsize);

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn wait(&self) -> Result<()> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 2 {
                return Err(StoreError::RateLimiter("budget exhausted".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_limiter_waits_before_each_item() {
        let backend = backend_with(5).await;
        let schema = schema();
        let plan = plan(&schema, "readings", &QueryInput::table().hash("sensor", "h1")).unwrap();
        let limiter = Arc::new(CountingLimiter(AtomicUsize::new(0)));
        let options = PageOptions {
            page_size: None,
            limiter: Some(limiter.clone()),
        };

        let mut seen = Vec::new();
        let result = iterate(backend, plan, options, decode, |seq, _| {
            seen.push(seq);
            true
        })
        .await;

        assert!(matches!(result, Err(StoreError::RateLimiter(_))));
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(limiter.0.load(Ordering::SeqCst), 3);
    }
}
