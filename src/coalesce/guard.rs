//! At-most-one in-flight upstream generation per subject.
//!
//! A request for a subject whose generation is already running returns
//! [`GuardOutcome::InProgress`] at once and never sees the first call's
//! result; the browser polls again later. Claims are released by a drop
//! guard, so success, failure, timeout, panic and handler cancellation all
//! free the subject.

use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::store::KeyedStore;
use crate::utils::fmt_duration;

/// What happened to a guarded generation request.
#[derive(Debug, PartialEq)]
pub enum GuardOutcome<T, E> {
    /// Another request for the same subject holds the claim. Upstream was not called.
    InProgress,
    /// The upstream call ran to completion (successfully or not).
    Completed(Result<T, E>),
    /// The upstream call exceeded the guard timeout and was abandoned.
    TimedOut,
}

/// Keyed in-flight flags with a bounded hold time. Clone-cheap.
#[derive(Clone)]
pub struct GenerationGuard<K>
where
    K: Eq + Hash,
{
    name: &'static str,
    timeout: Duration,
    /// subject → instant the claim was taken
    inflight: KeyedStore<K, Instant>,
}

impl<K> fmt::Debug for GenerationGuard<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationGuard")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

impl<K> GenerationGuard<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            inflight: KeyedStore::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_in_progress<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inflight.contains(key)
    }

    /// Atomically claim `key`. Returns `None` if it is already claimed.
    ///
    /// The check and the insert happen under the same shard lock, so two
    /// worker threads can never both observe the key as free.
    pub fn try_claim(&self, key: K) -> Option<Claim<K>> {
        if !self.inflight.insert_if_absent(key.clone(), Instant::now()) {
            return None;
        }
        debug!(guard = self.name, "generation claimed");
        Some(Claim {
            name: self.name,
            inflight: self.inflight.clone(),
            key,
        })
    }

    /// Run `generate` unless a generation for `key` is already in flight.
    ///
    /// `generate` is not polled at all when the subject is busy. Callers must
    /// validate their input before calling this, so malformed requests never
    /// take a claim.
    pub async fn run<F, T, E>(&self, key: K, generate: F) -> GuardOutcome<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let Some(_claim) = self.try_claim(key) else {
            debug!(guard = self.name, "generation already in progress");
            return GuardOutcome::InProgress;
        };

        match tokio::time::timeout(self.timeout, generate).await {
            Ok(result) => GuardOutcome::Completed(result),
            Err(_) => {
                warn!(
                    guard = self.name,
                    timeout = fmt_duration(self.timeout),
                    "generation timed out, releasing claim"
                );
                GuardOutcome::TimedOut
            }
        }
    }
}

/// Holds a subject's in-flight flag; dropping it clears the flag.
pub struct Claim<K>
where
    K: Eq + Hash,
{
    name: &'static str,
    inflight: KeyedStore<K, Instant>,
    key: K,
}

impl<K> Drop for Claim<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(claimed_at) = self.inflight.take(&self.key) {
            debug!(
                guard = self.name,
                held = fmt_duration(claimed_at.elapsed()),
                "generation released"
            );
        }
    }
}
