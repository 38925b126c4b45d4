use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use super::embedded::{self, EmbeddedRef};
use super::key::{QueryKey, QueryKind};

pub type Subscriber = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// One cached result set.
///
/// Payloads are shared and never mutated in place: every write stores a new
/// `Arc`, so `Arc::ptr_eq` tells a reader whether anything changed.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub payload: Arc<Value>,
    pub updated_at: Instant,
    pub invalidated: bool,
    pub embedded: Vec<EmbeddedRef>,
}

impl CacheEntry {
    fn new(key: QueryKey, payload: Value) -> Self {
        let embedded = embedded::scan(key.kind(), &payload);
        Self {
            key,
            payload: Arc::new(payload),
            updated_at: Instant::now(),
            invalidated: false,
            embedded,
        }
    }

    pub fn is_stale(&self, fresh_for: Duration) -> bool {
        self.invalidated || self.updated_at.elapsed() >= fresh_for
    }

    pub fn embeds(&self, company_id: Uuid) -> bool {
        self.embedded.iter().any(|r| r.company_id == company_id)
    }

    pub fn refs_to(&self, company_id: Uuid) -> impl Iterator<Item = &EmbeddedRef> + '_ {
        self.embedded
            .iter()
            .filter(move |r| r.company_id == company_id)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QueryKey, CacheEntry>,
    subscribers: HashMap<QueryKey, Vec<(SubscriptionId, Subscriber)>>,
}

/// Key-value store of query results with subscriber notification.
///
/// All reads and writes go through this interface. Subscribers run after the
/// lock is released, so a callback may read the store again.
#[derive(Default)]
pub struct CacheStore {
    inner: RwLock<Inner>,
    next_subscription: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.read().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.read().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self.read().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Replace the payload, reset the staleness clock and notify subscribers.
    pub fn set(&self, key: QueryKey, payload: Value) {
        let entry = CacheEntry::new(key.clone(), payload);
        let subscribers = {
            let mut inner = self.write();
            inner.entries.insert(key.clone(), entry.clone());
            Self::subscribers_of(&inner, &key)
        };

        tracing::trace!(cache_key = %key, "cache set");
        for subscriber in subscribers {
            subscriber(&entry);
        }
    }

    /// Mark stale; the next read through the query client refetches.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        match self.write().entries.get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                tracing::debug!(cache_key = %key, "cache entry invalidated");
                true
            }
            None => false,
        }
    }

    pub fn invalidate_kind(&self, kind: QueryKind) -> usize {
        let mut inner = self.write();
        let mut count = 0;
        for entry in inner.entries.values_mut().filter(|e| e.key.kind() == kind) {
            entry.invalidated = true;
            count += 1;
        }
        count
    }

    pub fn remove(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.write().entries.remove(key)
    }

    pub fn subscribe<F>(&self, key: QueryKey, callback: F) -> SubscriptionId
    where
        F: Fn(&CacheEntry) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.write()
            .subscribers
            .entry(key)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.write();
        let mut removed = false;
        inner.subscribers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|(sub_id, _)| *sub_id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Entries holding at least one copy of the company.
    pub fn entries_embedding(&self, company_id: Uuid) -> Vec<CacheEntry> {
        let mut entries: Vec<_> = self
            .read()
            .entries
            .values()
            .filter(|e| e.embeds(company_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Rewrite many entries under one write lock.
    ///
    /// `rewrite` returns a new payload for entries that change and `None` for
    /// the rest. Changed entries are stored like a `set`. Returns the keys
    /// that changed.
    pub fn update_entries<F>(&self, mut rewrite: F) -> Vec<QueryKey>
    where
        F: FnMut(&CacheEntry) -> Option<Value>,
    {
        let mut notifications = Vec::new();
        {
            let mut inner = self.write();
            let mut updated = Vec::new();
            for entry in inner.entries.values() {
                if let Some(payload) = rewrite(entry) {
                    updated.push(CacheEntry::new(entry.key.clone(), payload));
                }
            }
            for entry in updated {
                let subscribers = Self::subscribers_of(&inner, &entry.key);
                inner.entries.insert(entry.key.clone(), entry.clone());
                notifications.push((entry, subscribers));
            }
        }

        let mut keys = Vec::with_capacity(notifications.len());
        for (entry, subscribers) in notifications {
            for subscriber in subscribers {
                subscriber(&entry);
            }
            keys.push(entry.key);
        }
        keys.sort();
        keys
    }

    fn subscribers_of(inner: &Inner, key: &QueryKey) -> Vec<Subscriber> {
        inner
            .subscribers
            .get(key)
            .map(|subs| subs.iter().map(|(_, f)| f.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    const ACME: &str = "11111111-1111-4111-8111-111111111111";

    #[test]
    fn set_then_get() {
        let store = CacheStore::new();
        assert!(store.get(&QueryKey::deals()).is_none());

        store.set(QueryKey::deals(), json!({"deals": []}));
        let entry = store.get(&QueryKey::deals()).unwrap();
        assert_eq!(*entry.payload, json!({"deals": []}));
        assert!(!entry.is_stale(Duration::from_secs(60)));
        assert!(entry.is_stale(Duration::ZERO));
    }

    #[test]
    fn invalidate_marks_stale_and_set_clears_it() {
        let store = CacheStore::new();
        assert!(!store.invalidate(&QueryKey::deals()));

        store.set(QueryKey::deals(), json!([]));
        assert!(store.invalidate(&QueryKey::deals()));
        assert!(store
            .get(&QueryKey::deals())
            .unwrap()
            .is_stale(Duration::from_secs(60)));

        store.set(QueryKey::deals(), json!([]));
        assert!(!store.get(&QueryKey::deals()).unwrap().invalidated);
    }

    #[test]
    fn subscribers_fire_on_every_set_of_their_key() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = store.subscribe(QueryKey::deals(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set(QueryKey::deals(), json!(1));
        store.set(QueryKey::deals(), json!(2));
        store.set(QueryKey::company(Uuid::nil()), json!({}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(store.unsubscribe(id));
        store.set(QueryKey::deals(), json!(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn subscriber_may_read_the_store() {
        let store = Arc::new(CacheStore::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let (reader, seen_in_cb) = (store.clone(), seen.clone());
        store.subscribe(QueryKey::deals(), move |entry| {
            let current = reader.get(&entry.key).unwrap();
            assert!(Arc::ptr_eq(&current.payload, &entry.payload));
            seen_in_cb.fetch_add(1, Ordering::SeqCst);
        });

        store.set(QueryKey::deals(), json!({"deals": []}));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tracks_embedded_companies() {
        let store = CacheStore::new();
        let acme = Uuid::parse_str(ACME).unwrap();
        store.set(
            QueryKey::deals(),
            json!({"deals": [{"id": "d1", "company": {"id": ACME}}]}),
        );
        store.set(QueryKey::user_rating(Uuid::nil(), acme), Value::Null);

        let embedding = store.entries_embedding(acme);
        assert_eq!(embedding.len(), 1);
        assert_eq!(embedding[0].key, QueryKey::deals());
        assert_eq!(embedding[0].refs_to(acme).count(), 1);
    }

    #[test]
    fn update_entries_replaces_only_rewritten_payloads() {
        let store = CacheStore::new();
        store.set(QueryKey::deals(), json!({"n": 1}));
        store.set(QueryKey::company(Uuid::nil()), json!({"n": 2}));
        let untouched = store.get(&QueryKey::company(Uuid::nil())).unwrap();

        let changed = store.update_entries(|entry| {
            (entry.key == QueryKey::deals()).then(|| json!({"n": 10}))
        });

        assert_eq!(changed, vec![QueryKey::deals()]);
        assert_eq!(*store.get(&QueryKey::deals()).unwrap().payload, json!({"n": 10}));
        let after = store.get(&QueryKey::company(Uuid::nil())).unwrap();
        assert!(Arc::ptr_eq(&after.payload, &untouched.payload));
    }

    #[test]
    fn invalidate_kind_only_touches_that_kind() {
        let store = CacheStore::new();
        store.set(QueryKey::deals(), json!([]));
        store.set(QueryKey::user_rating(Uuid::nil(), Uuid::nil()), Value::Null);

        assert_eq!(store.invalidate_kind(QueryKind::UserRating), 1);
        assert!(!store.get(&QueryKey::deals()).unwrap().invalidated);
    }
}
