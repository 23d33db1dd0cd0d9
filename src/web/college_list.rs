//! College-list generation and list management.

use axum::extract::State;
use axum::response::{Json, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::backend::{BackendCall, CollegeListRequest, CollegeRef, CollegeType, Page};
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::entitlement::require_subscription;
use crate::web::error::ApiError;
use crate::web::extract::{Body, Params, required};
use crate::web::generation;
use crate::web::upstream::{send_as, send_gated};

#[derive(Deserialize)]
pub struct GenerateBody {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
}

/// `POST /api/college-list`
///
/// At most one generation per subject runs at a time; concurrent callers get
/// the "in progress" response and poll again.
#[instrument(skip_all, fields(sub = %session.sub))]
pub async fn generate(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<GenerateBody>,
) -> Result<Response, ApiError> {
    let college_type = body
        .kind
        .as_ref()
        .and_then(Value::as_str)
        .and_then(CollegeType::parse)
        .ok_or_else(|| ApiError::bad_request("Invalid college type"))?;

    let call = BackendCall::GenerateCollegeList(CollegeListRequest {
        auth0_id: session.sub.clone(),
        college_type,
    });
    run_generation(&state, &session, call).await
}

/// `POST /api/college-list/generate`
///
/// Takes no body. Shares the subject's guard with [`generate`].
#[instrument(skip_all, fields(sub = %session.sub))]
pub async fn regenerate(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, ApiError> {
    run_generation(&state, &session, BackendCall::RegenerateCollegeList).await
}

async fn run_generation(
    state: &AppState,
    session: &Session,
    call: BackendCall,
) -> Result<Response, ApiError> {
    require_subscription(state, session).await?;

    let guard = &state.college_generations;
    let outcome = guard
        .run(session.sub.clone(), send_as(state, session, call))
        .await;

    Ok(generation::respond(outcome, guard.timeout()))
}

/// `GET /api/college-list/current-suggestions`
pub async fn current_suggestions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_gated(&state, &session, BackendCall::CurrentCollegeSuggestions)
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct TargetParams {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn first_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}

/// `GET /api/college-list/target-colleges?page=&per_page=`
pub async fn target_colleges(
    State(state): State<AppState>,
    session: Session,
    Params(params): Params<TargetParams>,
) -> Result<Json<Value>, ApiError> {
    let page = Page {
        page: params.page,
        per_page: Some(params.per_page),
    };
    send_gated(&state, &session, BackendCall::TargetColleges(page))
        .await
        .map(Json)
}

/// `GET /api/college-list/past-suggestions`
pub async fn past_suggestions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_gated(&state, &session, BackendCall::PastCollegeSuggestions)
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct CollegeBody {
    #[serde(default)]
    college_name: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl CollegeBody {
    fn into_ref(self) -> Result<CollegeRef, ApiError> {
        match (required(self.college_name), required(self.source)) {
            (Some(college_name), Some(source)) => Ok(CollegeRef {
                college_name,
                source,
            }),
            _ => Err(ApiError::bad_request(
                "Missing required fields: college_name or source",
            )),
        }
    }
}

/// `POST /api/college-list/add-target`
pub async fn add_target(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<CollegeBody>,
) -> Result<Json<Value>, ApiError> {
    let college = body.into_ref()?;
    send_gated(&state, &session, BackendCall::AddTargetCollege(college))
        .await
        .map(Json)
}

/// `POST /api/college-list/delete-college`
pub async fn delete_college(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<CollegeBody>,
) -> Result<Json<Value>, ApiError> {
    let college = body.into_ref()?;
    send_gated(&state, &session, BackendCall::DeleteCollege(college))
        .await
        .map(Json)
}
