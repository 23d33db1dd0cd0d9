//! Per-request tracing spans and request IDs.
//!
//! An incoming `X-Request-Id` (from the browser or a load balancer) is kept
//! when it is short and printable; otherwise a ULID is generated. The resolved
//! ID is echoed back as `X-Request-Id` and recorded on the request span, so
//! backend call logs made while handling the request carry it too.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

const REQUEST_ID: &str = "x-request-id";
const PLATFORM_REQUEST_ID: &str = "x-railway-request-id";
const MAX_INBOUND_ID_LEN: usize = 64;

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

fn inbound_id(headers: &HeaderMap) -> Option<String> {
    [REQUEST_ID, PLATFORM_REQUEST_ID]
        .into_iter()
        .filter_map(|name| headers.get(name)?.to_str().ok())
        .map(str::trim)
        .find(|id| {
            !id.is_empty()
                && id.len() <= MAX_INBOUND_ID_LEN
                && id.bytes().all(|b| b.is_ascii_graphic())
        })
        .map(String::from)
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let req_id =
            inbound_id(req.headers()).unwrap_or_else(|| ulid::Ulid::new().to_string());

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = tracing::info_span!("request", req_id = %req_id);
        let start = Instant::now();

        let future = self.inner.call(req);
        let header_value = HeaderValue::from_str(&req_id).ok();

        Box::pin(
            async move {
                let mut result = future.await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        match status {
                            200..=399 => {
                                tracing::debug!(%method, %path, status, duration_ms, "Response");
                            }
                            400..=499 => {
                                tracing::info!(%method, %path, status, duration_ms, "Response");
                            }
                            _ => {
                                tracing::warn!(%method, %path, status, duration_ms, "Response");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(%method, %path, error = ?e, duration_ms, "Request failed");
                    }
                }

                if let Ok(ref mut response) = result
                    && let Some(value) = header_value
                {
                    response.headers_mut().insert(REQUEST_ID, value);
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_ids_are_preferred_in_order() {
        let mut headers = HeaderMap::new();
        assert_eq!(inbound_id(&headers), None);

        headers.insert(PLATFORM_REQUEST_ID, HeaderValue::from_static("edge-1"));
        assert_eq!(inbound_id(&headers).as_deref(), Some("edge-1"));

        headers.insert(REQUEST_ID, HeaderValue::from_static("client-7"));
        assert_eq!(inbound_id(&headers).as_deref(), Some("client-7"));
    }

    #[test]
    fn unusable_inbound_ids_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID, HeaderValue::from_static("has space"));
        assert_eq!(inbound_id(&headers), None);

        let long = "x".repeat(MAX_INBOUND_ID_LEN + 1);
        headers.insert(REQUEST_ID, HeaderValue::from_str(&long).unwrap());
        assert_eq!(inbound_id(&headers), None);
    }
}
