//! The single place handlers reach the backend.
//!
//! Failures are logged here once, with the call label, and converted to
//! [`ApiError`]; handlers only add context of their own.

use serde_json::Value;
use tracing::{error, warn};

use crate::backend::{BackendCall, BackendError, BearerToken};
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::entitlement::require_subscription;
use crate::web::error::ApiError;

/// Send `call` on behalf of `session`.
pub async fn send_as(
    state: &AppState,
    session: &Session,
    call: BackendCall,
) -> Result<Value, ApiError> {
    send(state, Some(&session.token), call).await
}

/// Send `call` on behalf of `session` once its subscription is confirmed.
pub async fn send_gated(
    state: &AppState,
    session: &Session,
    call: BackendCall,
) -> Result<Value, ApiError> {
    require_subscription(state, session).await?;
    send_as(state, session, call).await
}

pub async fn send(
    state: &AppState,
    token: Option<&BearerToken>,
    call: BackendCall,
) -> Result<Value, ApiError> {
    let label = call.label();
    state
        .backend
        .send(token, call)
        .await
        .map_err(|e| log_failure(label, e))
}

fn log_failure(label: &'static str, error: BackendError) -> ApiError {
    match &error {
        BackendError::Status { status, .. } if *status < 500 => {
            warn!(call = label, status, error = %error, "backend rejected request");
        }
        _ => {
            error!(call = label, status = ?error.status(), error = ?error, "backend call failed");
        }
    }
    ApiError::from(error)
}
