//! Backend API client.
//!
//! Route handlers depend on the [`Backend`] trait only; [`BackendApi`] is the
//! reqwest-backed implementation used in production.

pub mod calls;
pub mod client;
pub mod errors;
pub mod json;
pub mod middleware;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub use calls::*;
pub use client::BackendApi;
pub use errors::BackendError;

/// The subject's ID token, forwarded verbatim as `Authorization: Bearer`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Executes one [`BackendCall`] and returns the decoded JSON body.
///
/// A 2xx response with an empty body decodes to [`Value::Null`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(
        &self,
        token: Option<&BearerToken>,
        call: BackendCall,
    ) -> Result<Value, BackendError>;
}
