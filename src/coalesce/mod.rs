//! Process-local request coalescing in front of the backend.
//!
//! Two policies share one keyed store design:
//!
//! - [`FreshnessCache`] serves a recent upstream response per subject and is
//!   invalidated before the subject's own writes.
//! - [`GenerationGuard`] allows at most one outstanding generation call per
//!   subject and answers everyone else with "in progress".
//!
//! Instances are owned by [`AppState`](crate::state::AppState). Guarantees
//! hold per process only; replicas do not share state.

pub mod freshness;
pub mod guard;
pub mod store;

pub use freshness::{CacheEntry, Cached, Freshness, FreshnessCache};
pub use guard::{Claim, GenerationGuard, GuardOutcome};
pub use store::KeyedStore;
