//! Uniform JSON error responses for every API route.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::backend::BackendError;
use crate::utils::retry_after_secs;

/// Machine-readable error kind, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    Unauthenticated,
    ValidationFailed,
    EntitlementDenied,
    UpstreamFailure,
    Internal,
    GenerationTimeout,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ApiErrorCode::EntitlementDenied => StatusCode::FORBIDDEN,
            ApiErrorCode::UpstreamFailure | ApiErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiErrorCode::GenerationTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// An error returned to the browser as `{success: false, error, code}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(ApiErrorCode::Unauthenticated, "Not authenticated")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ValidationFailed, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::EntitlementDenied, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::UpstreamFailure, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Internal, message)
    }

    /// A generation exceeded its time budget; the client may retry.
    pub fn generation_timeout(budget: Duration) -> Self {
        Self {
            code: ApiErrorCode::GenerationTimeout,
            message: "Generation timed out, please try again".to_owned(),
            retry_after: Some(budget.min(Duration::from_secs(30))),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_after.is_some()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.message,
            "code": self.code,
        });
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }

        let mut response = (self.code.status(), Json(body)).into_response();
        if let Some(retry_after) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs(retry_after).to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Rewrites the router timeout's bare 408 into the JSON error shape.
///
/// No handler answers 408 itself, so the status alone identifies it.
pub async fn request_timeout_as_json(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::upstream("Request timed out").into_response();
    }
    response
}

impl From<BackendError> for ApiError {
    fn from(error: BackendError) -> Self {
        match &error {
            BackendError::Status { status: 401, message } => {
                Self::new(ApiErrorCode::Unauthenticated, message.clone())
            }
            BackendError::Status { status: 403, message } => Self::forbidden(message.clone()),
            BackendError::Status { message, .. } => Self::upstream(message.clone()),
            BackendError::Decode { .. } => Self::upstream("Invalid response from server"),
            BackendError::Transport(_) if error.is_timeout() => {
                Self::upstream("Backend request timed out")
            }
            BackendError::Transport(_) => Self::upstream("Backend unavailable"),
            BackendError::Encode(_) => Self::internal_error("Failed to encode backend request"),
        }
    }
}
