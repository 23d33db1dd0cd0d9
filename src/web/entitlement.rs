//! Subscription gate for the paid feature routes.
//!
//! Handlers call [`require_subscription`] after their own input checks, so a
//! malformed request is rejected without a subscription lookup.

use tracing::{debug, info};

use crate::backend::BackendCall;
use crate::coalesce::Freshness;
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::error::{ApiError, ApiErrorCode};
use crate::web::subscription::is_subscribed;
use crate::web::upstream::send_as;

/// Fail with 403 unless the subject has an active subscription.
///
/// Only positive answers are cached, so a subject who subscribes mid-session
/// is let through on the next request.
pub async fn require_subscription(state: &AppState, session: &Session) -> Result<(), ApiError> {
    if !state.subscription_gate {
        return Ok(());
    }

    let cached = state
        .entitlement_cache
        .get_or_fetch_with(
            session.email.clone(),
            Freshness::Ttl,
            || async {
                send_as(state, session, BackendCall::SubscriptionStatus)
                    .await
                    .map(|status| is_subscribed(&status))
                    .map_err(gate_failure)
            },
            |subscribed| *subscribed,
        )
        .await?;

    if !cached.value {
        info!(sub = %session.sub, "subscription required");
        return Err(ApiError::forbidden("Subscription required for this feature"));
    }

    debug!(hit = cached.hit, "entitlement confirmed");
    Ok(())
}

fn gate_failure(error: ApiError) -> ApiError {
    match error.code {
        ApiErrorCode::Unauthenticated => error,
        _ => ApiError::upstream("Failed to verify subscription status"),
    }
}
