//! TTL cache in front of an upstream read.
//!
//! Serves a stored value while it is younger than the cache's TTL and falls
//! through to the upstream fetch otherwise. Failed fetches never touch the
//! store, so a stale entry stays in place for the next read to retry.

use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::store::KeyedStore;

/// A cached value and the instant it was written.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub written_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Fresh iff strictly younger than `ttl`; an entry exactly `ttl` old is stale.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.written_at.elapsed() < ttl
    }
}

/// How old a cached entry may be and still be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve only entries younger than the cache TTL.
    Ttl,
    /// Serve any present entry regardless of age.
    AnyAge,
}

/// Result of a cache-fronted read.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    /// `true` when the value came from the store without an upstream call.
    pub hit: bool,
}

/// Keyed TTL cache. Clone-cheap; clones share entries.
#[derive(Clone)]
pub struct FreshnessCache<K, V>
where
    K: Eq + Hash,
{
    name: &'static str,
    ttl: Duration,
    store: KeyedStore<K, CacheEntry<V>>,
}

impl<K, V> fmt::Debug for FreshnessCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreshnessCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<K, V> FreshnessCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            store: KeyedStore::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Return the stored value for `key` if it satisfies `freshness`.
    pub fn lookup<Q>(&self, key: &Q, freshness: Freshness) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.store.get(key)?;
        match freshness {
            Freshness::AnyAge => Some(entry.value),
            Freshness::Ttl if entry.is_fresh(self.ttl) => Some(entry.value),
            Freshness::Ttl => None,
        }
    }

    /// Store `value` for `key`, stamped with the current instant.
    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&self, key: K, value: V, written_at: Instant) {
        self.store.set(key, CacheEntry { value, written_at });
    }

    /// Drop the entry for `key` so the next read goes upstream.
    ///
    /// Mutating endpoints call this *before* issuing their upstream write.
    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.delete(key);
        debug!(cache = self.name, "cache entry invalidated");
    }

    /// Serve from cache when allowed, otherwise run `fetch` and store its result.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: K,
        freshness: Freshness,
        fetch: F,
    ) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_fetch_with(key, freshness, fetch, |_| true)
            .await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but only values accepted by
    /// `should_store` are written back.
    pub async fn get_or_fetch_with<F, Fut, E, P>(
        &self,
        key: K,
        freshness: Freshness,
        fetch: F,
        should_store: P,
    ) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: FnOnce(&V) -> bool,
    {
        if let Some(value) = self.lookup(&key, freshness) {
            trace!(cache = self.name, ?freshness, "cache hit");
            return Ok(Cached { value, hit: true });
        }

        // Stamp with the request's start so the entry never outlives what the
        // upstream knew when the read began.
        let started = Instant::now();
        debug!(cache = self.name, "cache miss, fetching upstream");
        let value = fetch().await?;

        if should_store(&value) {
            self.insert_at(key, value.clone(), started);
        }

        Ok(Cached { value, hit: false })
    }
}
