//! Response shaping for guarded generation routes.

use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};
use std::time::Duration;

use crate::coalesce::GuardOutcome;
use crate::web::error::ApiError;

pub const IN_PROGRESS_MESSAGE: &str = "Generation in progress";

/// Map a guard outcome onto the HTTP response.
///
/// "In progress" is a 200 with `success: true` so polling clients keep polling.
pub fn respond(outcome: GuardOutcome<Value, ApiError>, budget: Duration) -> Response {
    match outcome {
        GuardOutcome::InProgress => Json(json!({
            "success": true,
            "message": IN_PROGRESS_MESSAGE,
        }))
        .into_response(),
        GuardOutcome::Completed(Ok(body)) => Json(body).into_response(),
        GuardOutcome::Completed(Err(error)) => error.into_response(),
        GuardOutcome::TimedOut => ApiError::generation_timeout(budget).into_response(),
    }
}
