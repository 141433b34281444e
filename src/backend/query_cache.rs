use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::error::ApiError;
use super::normalize::ChapterKey;
use super::otruyen::ListKind;
use crate::config::CacheConfig;

const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);
const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Home,
    List { kind: ListKind, page: u32 },
    Categories,
    Category { slug: String, page: u32 },
    Detail(String),
    Search(String),
    Chapter(ChapterKey),
}

impl QueryKey {
    /// How long a cached response is served without refetching.
    pub fn stale_time(&self) -> Duration {
        match self {
            QueryKey::Home | QueryKey::List { .. } | QueryKey::Search(_) => FIVE_MINUTES,
            QueryKey::Detail(_) | QueryKey::Category { .. } | QueryKey::Chapter(_) => TEN_MINUTES,
            QueryKey::Categories => ONE_HOUR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
            max_delay: Duration::from_millis(config.retry_max_ms),
        }
    }

    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// `base * 2^attempt`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, ApiError>>>;

enum Slot {
    Ready { value: Arc<Value>, fetched_at: Instant },
    Pending(SharedFetch),
}

enum Lookup {
    Fresh(Arc<Value>),
    InFlight(SharedFetch),
    Miss,
}

/// Request-keyed response cache. Identical keys requested concurrently share one
/// fetch; successful responses are reused until their stale window passes.
#[derive(Clone)]
pub struct QueryCache {
    slots: Arc<RwLock<HashMap<QueryKey, Slot>>>,
    gc_time: Duration,
}

impl QueryCache {
    pub fn new(gc_time: Duration) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            gc_time,
        }
    }

    pub async fn fetch<F, Fut>(
        &self,
        key: QueryKey,
        retry: RetryPolicy,
        fetcher: F,
    ) -> Result<Arc<Value>, ApiError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let (fetch, owner) = {
            let mut slots = self.slots.write().await;
            let now = Instant::now();
            let gc_time = self.gc_time;
            slots.retain(|_, slot| match slot {
                Slot::Ready { fetched_at, .. } => now.duration_since(*fetched_at) < gc_time,
                Slot::Pending(_) => true,
            });

            let lookup = match slots.get(&key) {
                Some(Slot::Ready { value, fetched_at })
                    if now.duration_since(*fetched_at) < key.stale_time() =>
                {
                    Lookup::Fresh(Arc::clone(value))
                }
                Some(Slot::Pending(fetch)) => match fetch.peek() {
                    None => Lookup::InFlight(fetch.clone()),
                    // Finished but its owner went away before recording it.
                    Some(Ok(value)) => Lookup::Fresh(Arc::clone(value)),
                    Some(Err(_)) => Lookup::Miss,
                },
                _ => Lookup::Miss,
            };

            match lookup {
                Lookup::Fresh(value) => {
                    log::debug!("cache hit: {key:?}");
                    return Ok(value);
                }
                Lookup::InFlight(fetch) => {
                    log::debug!("joining in-flight request: {key:?}");
                    (fetch, false)
                }
                Lookup::Miss => {
                    let fetch = retry_with_backoff(key.clone(), retry, fetcher)
                        .boxed()
                        .shared();
                    slots.insert(key.clone(), Slot::Pending(fetch.clone()));
                    (fetch, true)
                }
            }
        };

        let result = fetch.await;

        if owner {
            let mut slots = self.slots.write().await;
            match &result {
                Ok(value) => {
                    slots.insert(
                        key,
                        Slot::Ready {
                            value: Arc::clone(value),
                            fetched_at: Instant::now(),
                        },
                    );
                }
                Err(_) => {
                    slots.remove(&key);
                }
            }
        }

        result
    }

    #[cfg(test)]
    async fn is_cached(&self, key: &QueryKey) -> bool {
        matches!(
            self.slots.read().await.get(key),
            Some(Slot::Ready { .. })
        )
    }
}

async fn retry_with_backoff<F, Fut>(
    key: QueryKey,
    policy: RetryPolicy,
    fetcher: F,
) -> Result<Arc<Value>, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(Arc::new(value)),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                log::warn!("{key:?} failed ({err}); retry {} in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                log::error!("{key:?} failed: {err}");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::from_config(&CacheConfig::default())
    }

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync + 'static {
        move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!({ "call": n }))
            }
            .boxed()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(30_000));
    }

    #[test]
    fn stale_windows_per_endpoint() {
        assert_eq!(QueryKey::Home.stale_time(), FIVE_MINUTES);
        assert_eq!(QueryKey::Detail("x".into()).stale_time(), TEN_MINUTES);
        assert_eq!(QueryKey::Categories.stale_time(), ONE_HOUR);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_fetch() {
        let cache = QueryCache::new(TEN_MINUTES);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.fetch(QueryKey::Home, policy(), counting_fetcher(calls.clone())),
            cache.fetch(QueryKey::Home, policy(), counting_fetcher(calls.clone())),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn serves_fresh_then_refetches_when_stale() {
        let cache = QueryCache::new(ONE_HOUR);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(QueryKey::Home, policy(), counting_fetcher(calls.clone()))
            .await
            .unwrap();
        let cached = cache
            .fetch(QueryKey::Home, policy(), counting_fetcher(calls.clone()))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*cached, json!({ "call": 0 }));

        tokio::time::advance(FIVE_MINUTES + Duration::from_secs(1)).await;

        let refreshed = cache
            .fetch(QueryKey::Home, policy(), counting_fetcher(calls.clone()))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*refreshed, json!({ "call": 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let cache = QueryCache::new(TEN_MINUTES);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = cache
            .fetch(QueryKey::Categories, policy(), move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ApiError::Http("connection reset".into()))
                    } else {
                        Ok(json!({ "ok": true }))
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let cache = QueryCache::new(TEN_MINUTES);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = cache
            .fetch(QueryKey::Home, policy().with_max_retries(2), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<Value, _>(ApiError::Status {
                        status: 503,
                        url: String::new(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_fail_fast_and_are_not_cached() {
        let cache = QueryCache::new(TEN_MINUTES);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::Detail("missing".into());

        for expected in 1..=2 {
            let counter = calls.clone();
            let result = cache
                .fetch(key.clone(), policy(), move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<Value, _>(ApiError::Status {
                            status: 404,
                            url: String::new(),
                        })
                    }
                })
                .await;
            assert!(result.unwrap_err().is_not_found());
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }
        assert!(!cache.is_cached(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn unused_entries_are_collected() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(QueryKey::Categories, policy(), counting_fetcher(calls.clone()))
            .await
            .unwrap();
        assert!(cache.is_cached(&QueryKey::Categories).await);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache
            .fetch(QueryKey::Home, policy(), counting_fetcher(calls.clone()))
            .await
            .unwrap();
        assert!(!cache.is_cached(&QueryKey::Categories).await);
    }
}
