//! Process-local keyed state shared by every request handler.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent map from subject key to per-subject state.
///
/// Clone-cheap: clones share the same underlying map. Nothing is persisted,
/// so every process (and every replica) starts with an empty store.
#[derive(Debug)]
pub struct KeyedStore<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<DashMap<K, V>>,
}

impl<K: Eq + Hash, V> Clone for KeyedStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored for `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Inserts or overwrites the value for `key`.
    pub fn set(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Removes `key`. No-op when absent.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.remove(key);
    }

    /// Removes `key` and returns its value.
    pub fn take<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.remove(key).map(|(_, value)| value)
    }

    /// Inserts `value` only if `key` is vacant; returns whether it did.
    ///
    /// The vacancy check and the insert run under one shard lock.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        match self.inner.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
