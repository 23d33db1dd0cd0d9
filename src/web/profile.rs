//! Profile read/update/delete. Reads are cached per subject; every write
//! drops the subject's entry before it reaches the backend.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::backend::BackendCall;
use crate::coalesce::Freshness;
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::error::ApiError;
use crate::web::extract::{Body, required};
use crate::web::upstream::send_as;

/// Keep only `{success: true, profile}` from a backend profile read.
fn profile_document(mut body: Value) -> Result<Value, ApiError> {
    let success = body.get("success").and_then(Value::as_bool) == Some(true);
    let profile = body
        .get_mut("profile")
        .map(Value::take)
        .filter(|p| !p.is_null());
    match (success, profile) {
        (true, Some(profile)) => Ok(json!({ "success": true, "profile": profile })),
        _ => {
            warn!("backend returned an unusable profile document");
            Err(ApiError::upstream("Invalid profile data received"))
        }
    }
}

/// `GET /api/profile`
#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let cached = state
        .profile_cache
        .get_or_fetch(session.email.clone(), Freshness::Ttl, || async {
            let body = send_as(&state, &session, BackendCall::GetProfile).await?;
            profile_document(body)
        })
        .await?;

    debug!(hit = cached.hit, "profile served");
    Ok(Json(cached.value))
}

/// `PUT /api/profile`
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    fields: Result<Body<Map<String, Value>>, ApiError>,
) -> Result<Json<Value>, ApiError> {
    // Dropped before the body is checked, so even a rejected write rereads.
    state.profile_cache.invalidate(&session.email);
    let Body(fields) = fields?;

    let body = send_as(&state, &session, BackendCall::UpdateProfile(fields)).await?;
    Ok(Json(body))
}

/// `DELETE /api/profile`
#[instrument(skip_all)]
pub async fn delete_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    state.invalidate_subject(&session.email);

    let body = send_as(&state, &session, BackendCall::DeleteProfile).await?;
    info!("profile deleted");
    Ok(Json(body))
}

/// `POST /api/profile-evaluation`
pub async fn evaluate_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_as(&state, &session, BackendCall::EvaluateProfile)
        .await
        .map(Json)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTargetCollegeBody {
    #[serde(default)]
    college_name: Option<String>,
}

fn target_colleges(profile_body: &Value) -> Vec<Value> {
    profile_body
        .pointer("/profile/target_colleges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn require_success(body: &Value, fallback: &str) -> Result<(), ApiError> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or(fallback);
    Err(ApiError::upstream(message))
}

/// `POST /api/profile/add-target-college`
///
/// Reads the profile fresh from the backend, rejects duplicates, then writes
/// the extended list back.
#[instrument(skip_all)]
pub async fn add_target_college(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<AddTargetCollegeBody>,
) -> Result<Json<Value>, ApiError> {
    let college_name = required(body.college_name)
        .ok_or_else(|| ApiError::bad_request("College name is required"))?;

    let current = send_as(&state, &session, BackendCall::GetProfile).await?;
    require_success(&current, "Failed to fetch profile")?;

    let mut colleges = target_colleges(&current);
    if colleges.iter().any(|c| c.as_str() == Some(college_name.as_str())) {
        return Err(ApiError::bad_request(
            "College is already in your target list",
        ));
    }
    colleges.push(Value::String(college_name.clone()));

    state.profile_cache.invalidate(&session.email);
    let mut update = Map::new();
    update.insert("target_colleges".to_owned(), Value::Array(colleges));
    let updated = send_as(&state, &session, BackendCall::UpdateProfile(update)).await?;
    require_success(&updated, "Failed to update target colleges")?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "message": format!("{college_name} added to target colleges"),
            "target_colleges": target_colleges(&updated),
        }
    })))
}
