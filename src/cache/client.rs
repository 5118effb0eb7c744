//! Query client.
//!
//! Serves reads from the query store when fresh, runs the registered query
//! function otherwise, and applies invalidation plans after mutations.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::infra::http::TransportError;

use super::config::CacheConfig;
use super::keys::{QueryFilter, QueryKey};
use super::planner::InvalidationPlan;
use super::store::{EntrySnapshot, QueryFn, QueryStore};

const METRIC_QUERY_HIT: &str = "storefront_query_hit_total";
const METRIC_QUERY_MISS: &str = "storefront_query_miss_total";
const METRIC_QUERY_INVALIDATED: &str = "storefront_query_invalidated_total";
const METRIC_QUERY_FETCH_MS: &str = "storefront_query_fetch_ms";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no query function registered for {0}")]
    Unregistered(QueryKey),
    #[error("failed to decode cached data for {key}: {source}")]
    Decode {
        key: QueryKey,
        source: serde_json::Error,
    },
}

/// Handle over the shared query store.
///
/// Cloning is cheap; every clone sees the same entries.
#[derive(Clone, Debug)]
pub struct QueryClient {
    config: CacheConfig,
    store: Arc<QueryStore>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryClient {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(config, Arc::new(QueryStore::new()))
    }

    pub fn with_store(config: CacheConfig, store: Arc<QueryStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<QueryStore> {
        &self.store
    }

    /// Read `key` using `fetch` as its query function.
    ///
    /// The function is registered on the entry so later re-fetches (eager or
    /// through a subscription) can run it without the caller. A miss runs the
    /// given function directly, so the only failure is the fetch itself.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch_with<F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
    ) -> Result<Value, TransportError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        let query_fn: QueryFn = Arc::new(move || fetch().boxed());
        self.store.register_query_fn(key, Arc::clone(&query_fn));

        if let Some(data) = self.fresh_data(key) {
            counter!(METRIC_QUERY_HIT).increment(1);
            debug!("Query served from cache");
            return Ok(data);
        }

        counter!(METRIC_QUERY_MISS).increment(1);
        self.run(key, &query_fn).await
    }

    /// Read `key`, fetching only when the entry is missing, stale or expired.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch(&self, key: &QueryKey) -> Result<Value, QueryError> {
        if let Some(data) = self.fresh_data(key) {
            counter!(METRIC_QUERY_HIT).increment(1);
            debug!("Query served from cache");
            return Ok(data);
        }

        counter!(METRIC_QUERY_MISS).increment(1);
        self.run_query(key).await
    }

    /// Read `key` and decode it into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<T, QueryError> {
        let data = self.fetch(key).await?;
        decode(key, data)
    }

    /// Run the query function for `key` regardless of freshness.
    pub async fn refetch(&self, key: &QueryKey) -> Result<Value, QueryError> {
        self.run_query(key).await
    }

    async fn run_query(&self, key: &QueryKey) -> Result<Value, QueryError> {
        let query_fn = self
            .store
            .query_fn(key)
            .ok_or_else(|| QueryError::Unregistered(key.clone()))?;
        Ok(self.run(key, &query_fn).await?)
    }

    async fn run(&self, key: &QueryKey, query_fn: &QueryFn) -> Result<Value, TransportError> {
        let generation = self.store.begin_fetch(key);
        let started_at = Instant::now();
        let result = query_fn().await;
        histogram!(METRIC_QUERY_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(data) => {
                let fresh = self.store.finish_fetch(key, generation, data.clone());
                debug!(key = %key, generation, fresh, "Query fetched");
                Ok(data)
            }
            Err(err) => {
                self.store.fail_fetch(key);
                Err(err)
            }
        }
    }

    fn fresh_data(&self, key: &QueryKey) -> Option<Value> {
        let snapshot = self.store.snapshot(key)?;
        if snapshot.is_fresh(self.config.stale_time(), Instant::now()) {
            snapshot.data
        } else {
            None
        }
    }

    /// Mark every entry matching `filter` stale without fetching.
    pub fn invalidate(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        let affected = self.store.invalidate(filter);
        counter!(METRIC_QUERY_INVALIDATED).increment(affected.len() as u64);
        debug!(filter = %filter, affected = affected.len(), "Queries invalidated");
        affected
    }

    /// Re-fetch the exact entries in `keys` that exist and have a query function.
    ///
    /// Failures are logged and leave the entry stale for the next reader.
    pub async fn refetch_exact(&self, keys: &[QueryKey]) -> usize {
        let mut refetched = 0;
        for key in keys {
            if self.store.query_fn(key).is_none() {
                debug!(key = %key, "Skipping eager refetch: no registered query");
                continue;
            }
            match self.run_query(key).await {
                Ok(_) => refetched += 1,
                Err(err) => warn!(key = %key, error = %err, "Eager refetch failed"),
            }
        }
        refetched
    }

    /// Apply an invalidation plan: stale marks first, then eager re-fetches.
    pub async fn apply_plan(&self, plan: &InvalidationPlan) {
        for filter in &plan.invalidate {
            self.invalidate(filter);
        }
        if !plan.refetch_exact.is_empty() {
            self.refetch_exact(&plan.refetch_exact).await;
        }
    }

    pub fn set_query_data(&self, key: &QueryKey, data: Value) {
        self.store.write(key, data);
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.store.data(key)
    }

    pub fn entry(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        self.store.snapshot(key)
    }

    /// Subscribe a reader to `key`; the entry is kept alive while the handle lives.
    pub fn subscribe<F, Fut>(&self, key: QueryKey, fetch: F) -> Subscription
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        let query_fn: QueryFn = Arc::new(move || fetch().boxed());
        self.store.register_query_fn(&key, query_fn);
        let subscribers = self.store.subscribe(&key);
        debug!(key = %key, subscribers, "Query subscribed");
        Subscription {
            client: self.clone(),
            key,
        }
    }

    /// Remove entries that have been unsubscribed for longer than the GC window.
    pub fn collect_garbage(&self) -> Vec<QueryKey> {
        let collected = self
            .store
            .collect_garbage(self.config.gc_time(), Instant::now());
        if !collected.is_empty() {
            debug!(collected = collected.len(), "Collected inactive queries");
        }
        collected
    }
}

fn decode<T: DeserializeOwned>(key: &QueryKey, data: Value) -> Result<T, QueryError> {
    serde_json::from_value(data).map_err(|source| QueryError::Decode {
        key: key.clone(),
        source,
    })
}

/// A live reader of one query key. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    client: QueryClient,
    key: QueryKey,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current data, re-fetching if the entry went stale since the last read.
    pub async fn read(&self) -> Result<Value, QueryError> {
        self.client.fetch(&self.key).await
    }

    pub async fn read_as<T: DeserializeOwned>(&self) -> Result<T, QueryError> {
        self.client.fetch_as(&self.key).await
    }

    /// Entry state without triggering a fetch.
    pub fn peek(&self) -> Option<EntrySnapshot> {
        self.client.entry(&self.key)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.client.store.unsubscribe(&self.key);
        debug!(key = %self.key, remaining, "Query unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;

    fn counting_fetch(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> futures::future::Ready<Result<Value, TransportError>> + Send + Sync + 'static
    {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            futures::future::ready(Ok(json!({ "call": n })))
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_fetch() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::all_lists();

        let first = client
            .fetch_with(&key, counting_fetch(calls.clone()))
            .await
            .expect("first fetch");
        let second = client.fetch(&key).await.expect("cached read");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_is_lazy_until_next_read() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::wishlist();

        client
            .fetch_with(&key, counting_fetch(calls.clone()))
            .await
            .expect("fetch");
        client.invalidate(&QueryFilter::prefix(QueryKey::wishlist()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let data = client.fetch(&key).await.expect("refetch");
        assert_eq!(data, json!({"call": 2}));
        assert!(!client.entry(&key).expect("entry").stale);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_data() {
        let client = QueryClient::default();
        let key = QueryKey::wishlist();
        client.set_query_data(&key, json!({"lists": []}));
        client.invalidate(&QueryFilter::exact(key.clone()));

        let err = client
            .fetch_with(&key, || async {
                Err(TransportError::Status {
                    status: StatusCode::BAD_GATEWAY,
                    body: "upstream".into(),
                })
            })
            .await
            .expect_err("fetch should fail");

        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        let entry = client.entry(&key).expect("entry");
        assert_eq!(entry.data, Some(json!({"lists": []})));
        assert!(entry.stale);
        assert!(!entry.fetching);
    }

    #[tokio::test]
    async fn fetch_without_query_fn_is_an_error() {
        let client = QueryClient::default();
        let err = client
            .fetch(&QueryKey::customer_stats())
            .await
            .expect_err("nothing registered");
        assert!(matches!(err, QueryError::Unregistered(_)));
    }

    #[tokio::test]
    async fn fetch_with_runs_its_own_function_after_collection() {
        let config = CacheConfig {
            gc_time_ms: 0,
            ..Default::default()
        };
        let client = QueryClient::new(config);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::wishlist();

        client
            .fetch_with(&key, counting_fetch(calls.clone()))
            .await
            .expect("first fetch");
        assert_eq!(client.collect_garbage(), vec![key.clone()]);

        let data = client
            .fetch_with(&key, counting_fetch(calls.clone()))
            .await
            .expect("fetch after collection");
        assert_eq!(data, json!({"call": 2}));
    }

    #[tokio::test]
    async fn refetch_exact_skips_unknown_and_unregistered_keys() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        client.set_query_data(&QueryKey::wishlist(), json!(0));
        client
            .fetch_with(&QueryKey::all_lists(), counting_fetch(calls.clone()))
            .await
            .expect("fetch");

        let refetched = client
            .refetch_exact(&[
                QueryKey::all_lists(),
                QueryKey::wishlist(),
                QueryKey::customer_stats(),
            ])
            .await;

        assert_eq!(refetched, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!client.store().contains(&QueryKey::customer_stats()));
    }

    #[tokio::test]
    async fn subscription_reads_and_releases_entry() {
        let config = CacheConfig {
            gc_time_ms: 0,
            ..Default::default()
        };
        let client = QueryClient::new(config);
        let calls = Arc::new(AtomicUsize::new(0));

        let subscription = client.subscribe(QueryKey::all_lists(), counting_fetch(calls.clone()));
        assert_eq!(subscription.peek().expect("entry").subscribers, 1);
        assert!(subscription.peek().expect("entry").data.is_none());

        let value: Value = subscription.read_as().await.expect("read");
        assert_eq!(value, json!({"call": 1}));
        assert!(client.collect_garbage().is_empty());

        drop(subscription);
        assert_eq!(client.collect_garbage(), vec![QueryKey::all_lists()]);
    }

    #[tokio::test]
    async fn decode_errors_name_the_key() {
        let client = QueryClient::default();
        let key = QueryKey::wishlist();
        client.set_query_data(&key, json!("not a number"));

        let err = client.fetch_as::<u32>(&key).await.expect_err("decode");
        assert!(matches!(err, QueryError::Decode { .. }));
        assert!(err.to_string().contains(r#"["wishlist"]"#));
    }
}
