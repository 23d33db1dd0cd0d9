//! Subscription and payment passthroughs.
//!
//! Every mutation drops the subject's cached entitlement so the gate asks the
//! backend again on the next gated request.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::backend::BackendCall;
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::error::ApiError;
use crate::web::extract::{Body, Params, required};
use crate::web::upstream::{send, send_as};

/// Whether a subscription-status body says the subject is subscribed.
/// Anything missing or malformed counts as not subscribed.
pub fn is_subscribed(status: &Value) -> bool {
    status
        .pointer("/subscription/is_subscribed")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn inactive_subscription() -> Value {
    json!({
        "is_subscribed": false,
        "status": "inactive",
        "features": [],
    })
}

/// `GET /api/subscription/status`
///
/// Always answers with a `subscription` object; failures carry the inactive default.
#[instrument(skip_all)]
pub async fn status(State(state): State<AppState>, session: Session) -> Response {
    match send_as(&state, &session, BackendCall::SubscriptionStatus).await {
        Ok(mut body) => {
            let subscription = body
                .get_mut("subscription")
                .map(Value::take)
                .unwrap_or(Value::Null);
            Json(json!({ "success": true, "subscription": subscription })).into_response()
        }
        Err(error) => {
            let status = error.status();
            let body = json!({
                "success": false,
                "error": error.message,
                "code": error.code,
                "subscription": inactive_subscription(),
            });
            (status, Json(body)).into_response()
        }
    }
}

/// `GET /api/subscription` and `GET /api/payment/subscription-status`
pub async fn raw_status(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_as(&state, &session, BackendCall::SubscriptionStatus)
        .await
        .map(Json)
}

/// Send a subscription mutation, dropping the subject's entitlement first.
async fn mutate(
    state: &AppState,
    session: &Session,
    call: BackendCall,
) -> Result<Json<Value>, ApiError> {
    state.entitlement_cache.invalidate(&session.email);
    let label = call.label();
    let body = send_as(state, session, call).await?;
    info!(call = label, "subscription changed");
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct CreateBody {
    #[serde(default)]
    subscription_type: Option<String>,
}

/// `POST /api/subscription`
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<CreateBody>,
) -> Result<Json<Value>, ApiError> {
    let call = BackendCall::CreateSubscription {
        subscription_type: body.subscription_type,
    };
    mutate(&state, &session, call).await
}

#[derive(Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    plan_type: Option<String>,
}

/// `POST /api/subscription/create-checkout`
pub async fn create_checkout(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<CheckoutBody>,
) -> Result<Json<Value>, ApiError> {
    let call = BackendCall::CreateCheckout {
        plan_type: body.plan_type,
    };
    mutate(&state, &session, call).await
}

/// `POST /api/subscription/portal`
pub async fn portal(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    mutate(&state, &session, BackendCall::CreatePortalSession).await
}

/// `POST /api/subscription/cancel` and `DELETE /api/subscription`
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    mutate(&state, &session, BackendCall::CancelSubscription).await
}

/// `GET /api/subscription/prices`, public.
pub async fn prices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    send(&state, None, BackendCall::Prices).await.map(Json)
}

#[derive(Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    session_id: Option<String>,
}

/// `GET /api/payment/verify-subscription?session_id=`
pub async fn verify_checkout(
    State(state): State<AppState>,
    session: Session,
    Params(params): Params<VerifyParams>,
) -> Result<Json<Value>, ApiError> {
    let session_id = required(params.session_id)
        .ok_or_else(|| ApiError::bad_request("No session ID provided"))?;
    mutate(&state, &session, BackendCall::VerifyCheckout { session_id }).await
}
