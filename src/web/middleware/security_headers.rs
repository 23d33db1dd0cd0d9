//! Security and caching headers applied to every API response.
//!
//! Responses carry per-user data, so they are marked `private, no-store`
//! unless a handler already chose a `Cache-Control`. HSTS is only sent when
//! the request arrived over TLS at the edge (`X-Forwarded-Proto: https`).

use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::response::Response;
use std::task::{Context, Poll};
use tower::{Layer, Service};

static XFO: HeaderValue = HeaderValue::from_static("DENY");
static XCTO: HeaderValue = HeaderValue::from_static("nosniff");
static REFERRER: HeaderValue = HeaderValue::from_static("origin-when-cross-origin");
static PERMISSIONS: HeaderValue =
    HeaderValue::from_static("camera=(), microphone=(), geolocation=()");
static COOP: HeaderValue = HeaderValue::from_static("same-origin");
static CSP: HeaderValue = HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'");
static HSTS: HeaderValue = HeaderValue::from_static("max-age=31536000; includeSubDomains");
static NO_STORE: HeaderValue = HeaderValue::from_static("private, no-store");

#[derive(Clone)]
pub struct SecurityHeadersLayer;

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersService { inner }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersService<S> {
    inner: S,
}

fn is_https(req: &Request) -> bool {
    req.headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

impl<S, B> Service<Request> for SecurityHeadersService<S>
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
        let https = is_https(&req);
        let future = self.inner.call(req);

        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();

            headers.insert(header::X_FRAME_OPTIONS, XFO.clone());
            headers.insert(header::X_CONTENT_TYPE_OPTIONS, XCTO.clone());
            headers.insert(header::REFERRER_POLICY, REFERRER.clone());
            headers.insert("permissions-policy", PERMISSIONS.clone());
            headers.insert("cross-origin-opener-policy", COOP.clone());
            headers.insert(header::CONTENT_SECURITY_POLICY, CSP.clone());
            if !headers.contains_key(header::CACHE_CONTROL) {
                headers.insert(header::CACHE_CONTROL, NO_STORE.clone());
            }
            if https {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, HSTS.clone());
            }

            Ok(response)
        })
    }
}
