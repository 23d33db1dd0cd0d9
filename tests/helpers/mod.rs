#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use spike_gateway::backend::{Backend, BackendCall, BackendError, BearerToken};
use spike_gateway::state::{AppState, StateOptions};
use spike_gateway::web::create_router;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// One call the gateway made against the scripted backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub label: &'static str,
    pub path: String,
    pub token: Option<String>,
    pub body: Option<Value>,
}

/// In-process [`Backend`] with scripted answers per call label.
///
/// Unscripted calls answer `{success: true}`, except subscription status,
/// which reports an active subscription so the entitlement gate passes.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<RecordedCall>>,
    queued: Mutex<HashMap<&'static str, VecDeque<Result<Value, BackendError>>>>,
    defaults: Mutex<HashMap<&'static str, Value>>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every `label` call with `body` until told otherwise.
    pub fn always(&self, label: &'static str, body: Value) {
        self.defaults.lock().unwrap().insert(label, body);
    }

    /// Answer the next `label` call with `result`.
    pub fn once(&self, label: &'static str, result: Result<Value, BackendError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(label)
            .or_default()
            .push_back(result);
    }

    pub fn fail_once(&self, label: &'static str, status: u16, message: &str) {
        self.once(
            label,
            Err(BackendError::Status {
                status,
                message: message.to_owned(),
            }),
        );
    }

    /// Park every `label` call until the returned handle is notified.
    /// One `notify_one` releases one parked call.
    pub fn hold(&self, label: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(label, notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.label == label)
            .count()
    }

    pub fn last(&self, label: &str) -> Option<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.label == label)
            .cloned()
    }

    /// Yield until `n` calls with `label` have reached the backend.
    pub async fn wait_for(&self, label: &str, n: usize) {
        for _ in 0..1_000 {
            if self.count(label) >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("backend never saw {n} `{label}` calls");
    }

    fn answer(&self, label: &'static str) -> Result<Value, BackendError> {
        if let Some(result) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(label)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        if let Some(body) = self.defaults.lock().unwrap().get(label) {
            return Ok(body.clone());
        }
        Ok(match label {
            "payment.status" => subscribed(true),
            _ => json!({ "success": true }),
        })
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn send(
        &self,
        token: Option<&BearerToken>,
        call: BackendCall,
    ) -> Result<Value, BackendError> {
        let label = call.label();
        self.calls.lock().unwrap().push(RecordedCall {
            label,
            path: call.path(),
            token: token.map(|t| t.as_str().to_owned()),
            body: call.body().ok().flatten(),
        });

        let hold = self.holds.lock().unwrap().get(label).cloned();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        self.answer(label)
    }
}

pub fn subscribed(active: bool) -> Value {
    json!({ "success": true, "subscription": { "is_subscribed": active, "status": "active" } })
}

/// Unsigned JWT carrying the claims the gateway reads.
pub fn token_for(sub: &str, email: &str) -> String {
    let claims = json!({
        "sub": sub,
        "email": email,
        "name": "Test Student",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("eyJhbGciOiJSUzI1NiJ9.{payload}.c2ln")
}

pub fn alice() -> String {
    token_for("google-oauth2|alice", "alice@example.com")
}

pub fn bob() -> String {
    token_for("google-oauth2|bob", "bob@example.com")
}

pub fn options() -> StateOptions {
    StateOptions {
        generation_timeout: GENERATION_TIMEOUT,
        subscription_gate: true,
    }
}

pub fn router(backend: Arc<MockBackend>) -> Router {
    router_with(backend, options())
}

pub fn router_with(backend: Arc<MockBackend>, options: StateOptions) -> Router {
    create_router(AppState::new(backend, options), REQUEST_TIMEOUT)
}

pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    request(Method::GET, uri, Some(token), None)
}

pub fn post(uri: &str, token: &str, body: Value) -> Request<Body> {
    request(Method::POST, uri, Some(token), Some(body))
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}
