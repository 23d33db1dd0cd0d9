//! reqwest-backed [`Backend`] implementation.

use anyhow::Context;
use async_trait::async_trait;
use http::StatusCode;
use http::header::{ACCEPT, CONTENT_TYPE};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, trace};
use url::Url;

use super::json::parse_json_with_context;
use super::middleware::TransactionLogger;
use super::{Backend, BackendCall, BackendError, BearerToken};

/// Raw error bodies longer than this are replaced by the status reason.
const MAX_RAW_ERROR_LEN: usize = 200;

/// Main entry point for the Backend API.
pub struct BackendApi {
    http: ClientWithMiddleware,
    base_url: String,
    upstream_timeout: Duration,
    generation_timeout: Duration,
}

impl BackendApi {
    pub fn new(
        base_url: &Url,
        upstream_timeout: Duration,
        generation_timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("spike-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let http = ClientBuilder::new(client).with(TransactionLogger).build();

        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            upstream_timeout,
            generation_timeout,
        })
    }

    fn timeout_for(&self, call: &BackendCall) -> Duration {
        if call.is_generation() {
            self.generation_timeout
        } else {
            self.upstream_timeout
        }
    }
}

#[async_trait]
impl Backend for BackendApi {
    #[instrument(skip_all, fields(call = call.label()))]
    async fn send(
        &self,
        token: Option<&BearerToken>,
        call: BackendCall,
    ) -> Result<Value, BackendError> {
        let path = call.path();
        let url = format!("{}{path}", self.base_url);

        let mut request = self
            .http
            .request(call.method(), &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout_for(&call));
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        if let Some(body) = call.body()? {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(reqwest_middleware::Error::from)?;
        trace!(status = status.as_u16(), bytes = text.len(), "backend body read");

        decode_response(status, &text, &path)
    }
}

/// Turn a backend response into JSON or a [`BackendError`].
///
/// Non-2xx messages come from the body's `error` field, else the raw text
/// when it is short plain text, else the status's canonical reason.
pub(crate) fn decode_response(
    status: StatusCode,
    body: &str,
    path: &str,
) -> Result<Value, BackendError> {
    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return parse_json_with_context(body).map_err(|source| BackendError::Decode {
            status: status.as_u16(),
            path: path.to_owned(),
            source,
        });
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .or_else(|| {
            let text = body.trim();
            let plain = !text.is_empty()
                && text.len() <= MAX_RAW_ERROR_LEN
                && !text.starts_with('<')
                && !text.starts_with('{');
            plain.then(|| text.to_owned())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Backend request failed")
                .to_owned()
        });

    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_success_body_is_null() {
        let value = decode_response(StatusCode::NO_CONTENT, "", "/api/x").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn success_body_is_passed_through() {
        let value = decode_response(
            StatusCode::OK,
            r#"{"success":true,"profile":{"email":"a@b.c"}}"#,
            "/api/profile/",
        )
        .unwrap();
        assert_eq!(value, json!({ "success": true, "profile": { "email": "a@b.c" } }));
    }

    #[test]
    fn malformed_success_body_is_a_decode_error() {
        let err = decode_response(StatusCode::OK, "<html>oops</html>", "/api/profile/").unwrap_err();
        match err {
            BackendError::Decode { status, path, .. } => {
                assert_eq!(status, 200);
                assert_eq!(path, "/api/profile/");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn error_field_is_preferred() {
        let err = decode_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Profile incomplete"}"#,
            "/api/college-list/",
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "Profile incomplete");
    }

    #[test]
    fn short_plain_text_is_used_as_message() {
        let err =
            decode_response(StatusCode::SERVICE_UNAVAILABLE, "maintenance", "/api/x").unwrap_err();
        assert_eq!(err.to_string(), "maintenance");
    }

    #[test]
    fn markup_falls_back_to_reason() {
        let err = decode_response(
            StatusCode::BAD_GATEWAY,
            "<html><body>502</body></html>",
            "/api/x",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Bad Gateway");
    }
}
