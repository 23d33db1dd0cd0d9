//! Extracurricular (EC) activity suggestions.

use axum::extract::State;
use axum::response::{Json, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::backend::{
    ActivityData, ActivityRequest, ActivitySource, AddActivityRequest, BackendCall,
    DeleteActivityRequest, Page, TargetSource,
};
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::entitlement::require_subscription;
use crate::web::error::ApiError;
use crate::web::extract::{Body, Params, number_or, positive_number, required};
use crate::web::generation;
use crate::web::upstream::{send_as, send_gated};

#[derive(Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    activity_type: Option<String>,
    #[serde(default)]
    hrs_per_wk: Option<Value>,
}

impl GenerateBody {
    fn into_request(self) -> Result<ActivityRequest, ApiError> {
        let activity_type = required(self.activity_type);
        let hrs_per_wk = self.hrs_per_wk.as_ref().and_then(positive_number);
        match (activity_type, hrs_per_wk) {
            (Some(activity_type), Some(hrs_per_wk)) => Ok(ActivityRequest {
                activity_type,
                hrs_per_wk,
            }),
            _ => Err(ApiError::bad_request("Missing required fields")),
        }
    }
}

/// `POST /api/ec-suggestions`
#[instrument(skip_all, fields(sub = %session.sub))]
pub async fn generate(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<GenerateBody>,
) -> Result<Response, ApiError> {
    let request = body.into_request()?;
    require_subscription(&state, &session).await?;

    let guard = &state.activity_generations;
    let outcome = guard
        .run(
            session.sub.clone(),
            send_as(&state, &session, BackendCall::GenerateActivities(request)),
        )
        .await;

    Ok(generation::respond(outcome, guard.timeout()))
}

/// `GET /api/ec-suggestions/current-suggestions`
pub async fn current_suggestions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_gated(&state, &session, BackendCall::CurrentActivitySuggestions)
        .await
        .map(Json)
}

/// `GET /api/ec-suggestions/past-suggestions`
pub async fn past_suggestions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_gated(&state, &session, BackendCall::PastActivitySuggestions)
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct TargetParams {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    per_page: Option<u32>,
}

fn first_page() -> u32 {
    1
}

/// `GET /api/ec-suggestions/target-activities?page=`
pub async fn target_activities(
    State(state): State<AppState>,
    session: Session,
    Params(params): Params<TargetParams>,
) -> Result<Json<Value>, ApiError> {
    let page = Page {
        page: params.page,
        per_page: params.per_page,
    };
    send_gated(&state, &session, BackendCall::TargetActivities(page))
        .await
        .map(Json)
}

/// An activity as the browser sends it back from a suggestion list.
#[derive(Deserialize)]
pub struct ActivityInput {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    hours_per_week: Option<Value>,
    #[serde(default)]
    activity_type: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

#[derive(Deserialize)]
pub struct ActivityBody {
    #[serde(default)]
    activity: Option<ActivityInput>,
    #[serde(default)]
    source: Option<String>,
}

impl ActivityBody {
    /// The activity's name and the raw source, or a 400.
    fn required_parts(self) -> Result<(ActivityInput, String, String), ApiError> {
        let source = required(self.source);
        match (self.activity, source) {
            (Some(mut activity), Some(source)) => match required(activity.name.take()) {
                Some(name) => Ok((activity, name, source)),
                None => Err(ApiError::bad_request("Missing required fields")),
            },
            _ => Err(ApiError::bad_request("Missing required fields")),
        }
    }
}

fn add_request(activity: ActivityInput, name: String, source: &str) -> AddActivityRequest {
    AddActivityRequest {
        activity_name: name.clone(),
        activity_data: ActivityData {
            name,
            description: activity.description.unwrap_or_default(),
            hours_per_week: number_or(activity.hours_per_week.as_ref(), 0),
            activity_type: required(activity.activity_type).unwrap_or_else(|| "Other".to_owned()),
            position: activity.position.unwrap_or_default(),
            added_at: Utc::now(),
        },
        source: TargetSource::from_client(source),
    }
}

/// `POST /api/ec-suggestions/add-target`
pub async fn add_target(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<ActivityBody>,
) -> Result<Json<Value>, ApiError> {
    let (activity, name, source) = body.required_parts()?;
    let request = add_request(activity, name, &source);
    send_gated(&state, &session, BackendCall::AddTargetActivity(request))
        .await
        .map(Json)
}

/// `POST /api/ec-suggestions/delete-activity`
pub async fn delete_activity(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<ActivityBody>,
) -> Result<Json<Value>, ApiError> {
    let (_, activity_name, source) = body.required_parts()?;
    let source =
        ActivitySource::parse(&source).ok_or_else(|| ApiError::bad_request("Invalid source"))?;

    let request = DeleteActivityRequest {
        activity_name,
        source,
    };
    send_gated(&state, &session, BackendCall::DeleteActivity(request))
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Number, json};

    fn generate_body(value: Value) -> Result<ActivityRequest, ApiError> {
        serde_json::from_value::<GenerateBody>(value)
            .unwrap()
            .into_request()
    }

    #[test]
    fn generation_requires_type_and_positive_hours() {
        assert!(generate_body(json!({ "activity_type": "Research" })).is_err());
        assert!(generate_body(json!({ "activity_type": "", "hrs_per_wk": 5 })).is_err());
        assert!(generate_body(json!({ "activity_type": "Research", "hrs_per_wk": 0 })).is_err());

        let request = generate_body(json!({ "activity_type": "Research", "hrs_per_wk": "5" }))
            .unwrap();
        assert_eq!(request.hrs_per_wk, Number::from(5));
    }

    #[test]
    fn added_activity_gets_defaults() {
        let body: ActivityBody = serde_json::from_value(json!({
            "activity": { "name": "Robotics Club" },
            "source": "current",
        }))
        .unwrap();
        let (activity, name, source) = body.required_parts().unwrap();
        let request = add_request(activity, name, &source);

        assert_eq!(request.activity_name, "Robotics Club");
        assert_eq!(request.source, TargetSource::Temp);
        assert_eq!(request.activity_data.activity_type, "Other");
        assert_eq!(request.activity_data.hours_per_week, Number::from(0));
        assert_eq!(request.activity_data.description, "");
    }

    #[test]
    fn activity_without_name_is_rejected() {
        let body: ActivityBody = serde_json::from_value(json!({
            "activity": { "description": "no name" },
            "source": "past",
        }))
        .unwrap();
        assert!(body.required_parts().is_err());
    }
}
