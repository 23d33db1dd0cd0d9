//! Application state shared by every route handler.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::Backend;
use crate::coalesce::{FreshnessCache, GenerationGuard};
use crate::config::Config;
use crate::web::session::Verification;

pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);
pub const PROFILE_TTL: Duration = Duration::from_secs(30);
pub const ENTITLEMENT_TTL: Duration = Duration::from_secs(60);

/// Knobs the handlers read at request time.
#[derive(Debug, Clone)]
pub struct StateOptions {
    pub generation_timeout: Duration,
    pub subscription_gate: bool,
}

impl From<&Config> for StateOptions {
    fn from(config: &Config) -> Self {
        Self {
            generation_timeout: config.generation_timeout,
            subscription_gate: config.subscription_gate,
        }
    }
}

/// Owns the backend client and every coalescer instance.
///
/// Coalescing state lives in this process only; replicas each keep their own.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    /// Backend session verifications by email.
    pub session_cache: FreshnessCache<String, Verification>,
    /// `{success, profile}` documents by email.
    pub profile_cache: FreshnessCache<String, Value>,
    /// Positive subscription checks by email.
    pub entitlement_cache: FreshnessCache<String, bool>,
    /// In-flight college-list generations by subject.
    pub college_generations: GenerationGuard<String>,
    /// In-flight activity generations by subject.
    pub activity_generations: GenerationGuard<String>,
    pub subscription_gate: bool,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, options: StateOptions) -> Self {
        Self {
            backend,
            session_cache: FreshnessCache::new("session", SESSION_TTL),
            profile_cache: FreshnessCache::new("profile", PROFILE_TTL),
            entitlement_cache: FreshnessCache::new("entitlement", ENTITLEMENT_TTL),
            college_generations: GenerationGuard::new(
                "college_list",
                options.generation_timeout,
            ),
            activity_generations: GenerationGuard::new(
                "activities",
                options.generation_timeout,
            ),
            subscription_gate: options.subscription_gate,
        }
    }

    /// Forget everything cached for `email`.
    pub fn invalidate_subject(&self, email: &str) {
        self.session_cache.invalidate(email);
        self.profile_cache.invalidate(email);
        self.entitlement_cache.invalidate(email);
    }
}
