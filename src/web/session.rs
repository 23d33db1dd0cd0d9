//! Session verification, cached per subject.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::backend::BackendCall;
use crate::backend::json::from_value_with_path;
use crate::coalesce::Freshness;
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::error::ApiError;
use crate::web::upstream::send_as;

/// Set by the browser while a long generation runs, so its periodic session
/// checks do not re-verify upstream.
pub const GENERATION_IN_PROGRESS_HEADER: &str = "x-generation-in-progress";

/// The user record returned by a successful backend verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a backend session verification.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Verified(SessionUser),
    /// A 2xx body with `success` not true, passed through as-is and never cached.
    Rejected(Value),
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified(_))
    }

    fn into_body(self) -> Value {
        match self {
            Verification::Verified(user) => json!({ "success": true, "user": user }),
            Verification::Rejected(body) => body,
        }
    }
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
    user: Option<SessionUser>,
}

fn parse_verification(body: Value) -> Result<Verification, ApiError> {
    let parsed: VerifyResponse = from_value_with_path(body.clone()).map_err(|e| {
        tracing::warn!(error = %e, "unexpected verify-session response");
        ApiError::upstream("Invalid response from server")
    })?;
    match (parsed.success, parsed.user) {
        (true, Some(user)) => Ok(Verification::Verified(user)),
        _ => Ok(Verification::Rejected(body)),
    }
}

fn generation_in_progress(headers: &HeaderMap) -> bool {
    headers
        .get(GENERATION_IN_PROGRESS_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// `GET /api/auth/verify-session`
#[instrument(skip_all)]
pub async fn verify_session(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let freshness = if generation_in_progress(&headers) {
        Freshness::AnyAge
    } else {
        Freshness::Ttl
    };

    let cached = state
        .session_cache
        .get_or_fetch_with(
            session.email.clone(),
            freshness,
            || async {
                let body = send_as(&state, &session, BackendCall::VerifySession).await?;
                parse_verification(body)
            },
            Verification::is_verified,
        )
        .await?;

    debug!(hit = cached.hit, ?freshness, "session verification served");
    Ok(Json(cached.value.into_body()))
}

/// `GET /api/auth/verify`: uncached passthrough of the backend verification.
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_as(&state, &session, BackendCall::VerifySession)
        .await
        .map(Json)
}
