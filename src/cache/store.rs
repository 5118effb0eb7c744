//! Query entry table.
//!
//! The store is the single owner of cached query data. All access goes through
//! its read, write and invalidate operations; no guard escapes a method, so
//! the lock is never held across an await point.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::infra::http::TransportError;

use super::keys::{QueryFilter, QueryKey};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Produces fresh data for a query key.
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, TransportError>> + Send + Sync>;

struct Entry {
    data: Option<Value>,
    stale: bool,
    in_flight: usize,
    generation: u64,
    data_generation: u64,
    subscribers: usize,
    updated_at: Option<Instant>,
    inactive_since: Option<Instant>,
    query_fn: Option<QueryFn>,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Self {
            data: None,
            stale: false,
            in_flight: 0,
            generation: 0,
            data_generation: 0,
            subscribers: 0,
            updated_at: None,
            inactive_since: Some(now),
            query_fn: None,
        }
    }

    fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            data: self.data.clone(),
            stale: self.stale,
            fetching: self.in_flight > 0,
            generation: self.generation,
            subscribers: self.subscribers,
            updated_at: self.updated_at,
        }
    }
}

/// Point-in-time copy of an entry's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub data: Option<Value>,
    pub stale: bool,
    pub fetching: bool,
    pub generation: u64,
    pub subscribers: usize,
    pub updated_at: Option<Instant>,
}

impl EntrySnapshot {
    /// Whether a read can be served without a remote call.
    pub fn is_fresh(&self, stale_time: Option<Duration>, now: Instant) -> bool {
        if self.data.is_none() || self.stale {
            return false;
        }
        match (stale_time, self.updated_at) {
            (Some(limit), Some(updated_at)) => now.saturating_duration_since(updated_at) < limit,
            _ => true,
        }
    }
}

#[derive(Default)]
pub struct QueryStore {
    entries: RwLock<HashMap<QueryKey, Entry>>,
}

impl fmt::Debug for QueryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl QueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for `key` if it does not exist yet.
    pub fn ensure(&self, key: &QueryKey) {
        rw_write(&self.entries, SOURCE, "ensure")
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Instant::now()));
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(key)
    }

    pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        rw_read(&self.entries, SOURCE, "snapshot")
            .get(key)
            .map(Entry::snapshot)
    }

    pub fn data(&self, key: &QueryKey) -> Option<Value> {
        rw_read(&self.entries, SOURCE, "data")
            .get(key)
            .and_then(|entry| entry.data.clone())
    }

    /// Register the function used to (re)fetch `key`, replacing any previous one.
    pub fn register_query_fn(&self, key: &QueryKey, query_fn: QueryFn) {
        rw_write(&self.entries, SOURCE, "register_query_fn")
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Instant::now()))
            .query_fn = Some(query_fn);
    }

    pub fn query_fn(&self, key: &QueryKey) -> Option<QueryFn> {
        rw_read(&self.entries, SOURCE, "query_fn")
            .get(key)
            .and_then(|entry| entry.query_fn.clone())
    }

    pub fn subscribe(&self, key: &QueryKey) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "subscribe");
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Instant::now()));
        entry.subscribers += 1;
        entry.inactive_since = None;
        entry.subscribers
    }

    pub fn unsubscribe(&self, key: &QueryKey) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "unsubscribe");
        let Some(entry) = entries.get_mut(key) else {
            return 0;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            entry.inactive_since = Some(Instant::now());
        }
        entry.subscribers
    }

    /// Count a fetch in flight for `key` and return the generation it belongs to.
    pub fn begin_fetch(&self, key: &QueryKey) -> u64 {
        let mut entries = rw_write(&self.entries, SOURCE, "begin_fetch");
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Instant::now()));
        entry.in_flight += 1;
        entry.generation
    }

    /// Store the result of a fetch started at `generation`.
    ///
    /// The data is kept even when the entry was invalidated meanwhile, but the
    /// entry then stays stale. Results older than the data already held (a
    /// direct write or a later fetch) and results for collected entries are
    /// discarded. Returns whether the entry is fresh afterwards.
    pub fn finish_fetch(&self, key: &QueryKey, generation: u64, data: Value) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "finish_fetch");
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        if generation < entry.data_generation {
            return !entry.stale;
        }
        entry.data = Some(data);
        entry.data_generation = generation;
        entry.updated_at = Some(Instant::now());
        entry.stale = entry.generation != generation;
        !entry.stale
    }

    pub fn fail_fetch(&self, key: &QueryKey) {
        if let Some(entry) = rw_write(&self.entries, SOURCE, "fail_fetch").get_mut(key) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
        }
    }

    /// Replace the data for `key` directly, leaving it fresh.
    ///
    /// Bumps the generation so fetches already in flight cannot overwrite it.
    pub fn write(&self, key: &QueryKey, data: Value) {
        let mut entries = rw_write(&self.entries, SOURCE, "write");
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Instant::now()));
        entry.generation += 1;
        entry.data_generation = entry.generation;
        entry.data = Some(data);
        entry.stale = false;
        entry.updated_at = Some(Instant::now());
    }

    /// Mark every entry matching `filter` stale. Returns the affected keys.
    pub fn invalidate(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        entries
            .iter_mut()
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, entry)| {
                entry.stale = true;
                entry.generation += 1;
                key.clone()
            })
            .collect()
    }

    pub fn keys_matching(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        rw_read(&self.entries, SOURCE, "keys_matching")
            .keys()
            .filter(|key| filter.matches(key))
            .cloned()
            .collect()
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        rw_write(&self.entries, SOURCE, "remove").remove(key).is_some()
    }

    /// Drop entries that have had no subscribers for at least `gc_time` as of `now`.
    pub fn collect_garbage(&self, gc_time: Duration, now: Instant) -> Vec<QueryKey> {
        let mut entries = rw_write(&self.entries, SOURCE, "collect_garbage");
        let expired: Vec<QueryKey> = entries
            .iter()
            .filter(|(_, entry)| {
                entry.subscribers == 0
                    && entry.in_flight == 0
                    && entry
                        .inactive_since
                        .is_some_and(|since| now.saturating_duration_since(since) >= gc_time)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    #[test]
    fn write_then_invalidate_marks_stale() {
        let store = QueryStore::new();
        let key = QueryKey::all_lists();

        store.write(&key, json!({"wishlists": []}));
        let fresh = store.snapshot(&key).expect("entry");
        assert!(fresh.is_fresh(None, Instant::now()));

        let affected = store.invalidate(&QueryFilter::prefix(QueryKey::all_lists()));
        assert_eq!(affected, vec![key.clone()]);

        let stale = store.snapshot(&key).expect("entry");
        assert!(stale.stale);
        assert_eq!(stale.generation, fresh.generation + 1);
        assert!(!stale.is_fresh(None, Instant::now()));
        assert_eq!(stale.data, Some(json!({"wishlists": []})));
    }

    #[test]
    fn invalidate_skips_unrelated_keys() {
        let store = QueryStore::new();
        store.write(&QueryKey::wishlist(), json!(1));
        store.write(&QueryKey::custom("orders"), json!(2));

        store.invalidate(&QueryFilter::prefix(QueryKey::wishlist()));

        assert!(store.snapshot(&QueryKey::wishlist()).expect("entry").stale);
        assert!(!store.snapshot(&QueryKey::custom("orders")).expect("entry").stale);
    }

    #[test]
    fn invalidation_during_fetch_keeps_entry_stale() {
        let store = QueryStore::new();
        let key = QueryKey::wishlist();

        let generation = store.begin_fetch(&key);
        store.invalidate(&QueryFilter::exact(key.clone()));
        let fresh = store.finish_fetch(&key, generation, json!({"lists": []}));

        assert!(!fresh);
        let snapshot = store.snapshot(&key).expect("entry");
        assert!(snapshot.stale);
        assert!(!snapshot.fetching);
        assert!(snapshot.data.is_some());
    }

    #[test]
    fn failed_fetch_keeps_entry_busy_while_another_is_in_flight() {
        let store = QueryStore::new();
        let key = QueryKey::wishlist();

        let first = store.begin_fetch(&key);
        let second = store.begin_fetch(&key);
        store.fail_fetch(&key);

        assert!(store.snapshot(&key).expect("entry").fetching);
        assert!(store.collect_garbage(Duration::ZERO, Instant::now()).is_empty());

        assert!(store.finish_fetch(&key, second, json!({"lists": []})));
        assert!(!store.snapshot(&key).expect("entry").fetching);
        assert_eq!(first, second);
        assert_eq!(
            store.collect_garbage(Duration::ZERO, Instant::now()),
            vec![key]
        );
    }

    #[test]
    fn direct_write_wins_over_fetch_already_in_flight() {
        let store = QueryStore::new();
        let key = QueryKey::all_lists();

        let generation = store.begin_fetch(&key);
        store.write(&key, json!({"wishlists": ["optimistic"]}));
        let fresh = store.finish_fetch(&key, generation, json!({"wishlists": []}));

        assert!(fresh);
        let snapshot = store.snapshot(&key).expect("entry");
        assert_eq!(snapshot.data, Some(json!({"wishlists": ["optimistic"]})));
        assert!(!snapshot.stale);
        assert!(!snapshot.fetching);
    }

    #[test]
    fn finish_fetch_discards_result_for_removed_entry() {
        let store = QueryStore::new();
        let key = QueryKey::wishlist();

        let generation = store.begin_fetch(&key);
        store.remove(&key);

        assert!(!store.finish_fetch(&key, generation, json!(1)));
        assert!(!store.contains(&key));
    }

    #[test]
    fn stale_time_expires_fresh_data() {
        let store = QueryStore::new();
        let key = QueryKey::wishlist();
        store.write(&key, json!(1));

        let snapshot = store.snapshot(&key).expect("entry");
        let later = Instant::now() + Duration::from_secs(10);
        assert!(snapshot.is_fresh(Some(Duration::from_secs(60)), later));
        assert!(!snapshot.is_fresh(Some(Duration::from_secs(5)), later));
    }

    #[test]
    fn garbage_collection_spares_subscribed_entries() {
        let store = QueryStore::new();
        let watched = QueryKey::all_lists();
        let idle = QueryKey::wishlist();

        store.subscribe(&watched);
        store.ensure(&idle);

        let collected = store.collect_garbage(Duration::ZERO, Instant::now());
        assert_eq!(collected, vec![idle.clone()]);
        assert!(store.contains(&watched));

        assert_eq!(store.unsubscribe(&watched), 0);
        let collected = store.collect_garbage(Duration::from_secs(60), Instant::now());
        assert!(collected.is_empty());
        let collected =
            store.collect_garbage(Duration::from_secs(60), Instant::now() + Duration::from_secs(61));
        assert_eq!(collected, vec![watched]);
        assert!(store.is_empty());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = QueryStore::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entries.write().expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.write(&QueryKey::wishlist(), json!(true));
        assert_eq!(store.data(&QueryKey::wishlist()), Some(json!(true)));
    }
}
