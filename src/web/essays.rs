//! Essay feedback and brainstorming, plus their conversation threads.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Number, Value, json};
use tracing::info;
use ulid::Ulid;

use crate::backend::{
    BackendCall, BrainstormThread, EssayBrainstormRequest, EssayFeedbackRequest, FeedbackThread,
};
use crate::state::AppState;
use crate::web::auth::Session;
use crate::web::error::ApiError;
use crate::web::extract::{Body, Params, number_or, positive_number, required};
use crate::web::upstream::send_gated;

fn missing_fields() -> ApiError {
    ApiError::bad_request("Missing required fields")
}

#[derive(Deserialize)]
pub struct FeedbackBody {
    #[serde(default)]
    college_name: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    essay_text: Option<String>,
    #[serde(default)]
    word_count: Option<Value>,
    #[serde(default)]
    feedback_questions: Option<Vec<Value>>,
    #[serde(default)]
    is_new_thread: Option<bool>,
    #[serde(default)]
    thread_id: Option<String>,
}

/// The validated core shared by feedback submissions and new feedback threads.
#[derive(Debug)]
struct Essay {
    college_name: String,
    prompt: String,
    essay_text: String,
    word_count: Number,
    feedback_questions: Vec<Value>,
}

impl FeedbackBody {
    fn split(self) -> Result<(Essay, Option<bool>, Option<String>), ApiError> {
        let word_count = self.word_count.as_ref().and_then(positive_number);
        let (Some(college_name), Some(prompt), Some(essay_text), Some(word_count)) = (
            required(self.college_name),
            required(self.prompt),
            required(self.essay_text),
            word_count,
        ) else {
            return Err(missing_fields());
        };

        let essay = Essay {
            college_name,
            prompt,
            essay_text,
            word_count,
            feedback_questions: self.feedback_questions.unwrap_or_default(),
        };
        Ok((essay, self.is_new_thread, required(self.thread_id)))
    }
}

/// `POST /api/essay-feedback`
pub async fn feedback(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<FeedbackBody>,
) -> Result<Json<Value>, ApiError> {
    let (essay, is_new_thread, thread_id) = body.split()?;
    let request = EssayFeedbackRequest {
        college_name: essay.college_name,
        prompt: essay.prompt,
        essay_text: essay.essay_text,
        word_count: essay.word_count,
        feedback_questions: essay.feedback_questions,
        is_new_thread,
        thread_id,
        auth0_id: session.sub.clone(),
    };
    send_gated(&state, &session, BackendCall::EssayFeedback(request))
        .await
        .map(Json)
}

/// `GET /api/essay-feedback/threads`
pub async fn feedback_threads(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_gated(&state, &session, BackendCall::ListFeedbackThreads)
        .await
        .map(Json)
}

/// `POST /api/essay-feedback/threads`
pub async fn create_feedback_thread(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<FeedbackBody>,
) -> Result<Json<Value>, ApiError> {
    let (essay, _, _) = body.split()?;
    let thread = FeedbackThread {
        thread_id: new_thread_id(),
        college_name: essay.college_name,
        prompt: essay.prompt,
        essay_text: essay.essay_text,
        word_count: essay.word_count,
        feedback_questions: essay.feedback_questions,
    };
    send_gated(&state, &session, BackendCall::CreateFeedbackThread(thread))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct ThreadParams {
    #[serde(rename = "threadId", default)]
    thread_id: Option<String>,
}

impl ThreadParams {
    fn thread_id(self) -> Result<String, ApiError> {
        required(self.thread_id).ok_or_else(|| ApiError::bad_request("Thread ID is required"))
    }
}

/// `DELETE /api/essay-feedback/threads?threadId=`
pub async fn delete_feedback_thread(
    State(state): State<AppState>,
    session: Session,
    Params(params): Params<ThreadParams>,
) -> Result<StatusCode, ApiError> {
    let thread_id = params.thread_id()?;
    send_gated(&state, &session, BackendCall::DeleteFeedbackThread(thread_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct BrainstormBody {
    #[serde(default)]
    college_name: Option<String>,
    #[serde(default)]
    essay_prompt: Option<String>,
    #[serde(default)]
    word_limit: Option<Value>,
    #[serde(default)]
    is_new_thread: Option<bool>,
    #[serde(default)]
    thread_id: Option<String>,
}

impl BrainstormBody {
    fn required_prompt(&self) -> Result<(String, String), ApiError> {
        match (
            required(self.college_name.clone()),
            required(self.essay_prompt.clone()),
        ) {
            (Some(college_name), Some(essay_prompt)) => Ok((college_name, essay_prompt)),
            _ => Err(missing_fields()),
        }
    }
}

/// `POST /api/essay-brainstorm`
pub async fn brainstorm(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<BrainstormBody>,
) -> Result<Json<Value>, ApiError> {
    let (college_name, essay_prompt) = body.required_prompt()?;
    let request = EssayBrainstormRequest {
        college_name,
        essay_prompt,
        word_limit: body.word_limit.as_ref().and_then(positive_number),
        is_new_thread: body.is_new_thread,
        thread_id: required(body.thread_id),
        auth0_id: session.sub.clone(),
    };
    send_gated(&state, &session, BackendCall::EssayBrainstorm(request))
        .await
        .map(Json)
}

/// `GET /api/essay-brainstorm/threads`
pub async fn brainstorm_threads(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    send_gated(&state, &session, BackendCall::ListBrainstormThreads)
        .await
        .map(Json)
}

/// `POST /api/essay-brainstorm/threads`
///
/// The response always carries the generated `thread_id`, with the backend's
/// fields layered on top.
pub async fn create_brainstorm_thread(
    State(state): State<AppState>,
    session: Session,
    Body(body): Body<BrainstormBody>,
) -> Result<Json<Value>, ApiError> {
    let (college_name, essay_prompt) = body.required_prompt()?;
    let thread = BrainstormThread {
        thread_id: new_thread_id(),
        college_name,
        essay_prompt,
        word_limit: number_or(body.word_limit.as_ref(), 0),
    };
    let thread_id = thread.thread_id.clone();

    let result = send_gated(&state, &session, BackendCall::CreateBrainstormThread(thread)).await?;
    info!(%thread_id, "brainstorm thread created");
    Ok(Json(merge_thread_response(&thread_id, result)))
}

/// `DELETE /api/essay-brainstorm/threads?threadId=`
pub async fn delete_brainstorm_thread(
    State(state): State<AppState>,
    session: Session,
    Params(params): Params<ThreadParams>,
) -> Result<StatusCode, ApiError> {
    let thread_id = params.thread_id()?;
    send_gated(&state, &session, BackendCall::DeleteBrainstormThread(thread_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn new_thread_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

fn merge_thread_response(thread_id: &str, result: Value) -> Value {
    let mut merged = json!({ "success": true, "thread_id": thread_id });
    if let (Some(target), Value::Object(fields)) = (merged.as_object_mut(), result) {
        target.extend(fields);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback_body(value: Value) -> FeedbackBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn feedback_requires_nonzero_word_count() {
        let complete = json!({
            "college_name": "MIT",
            "prompt": "Why us?",
            "essay_text": "Because.",
            "word_count": 250,
        });
        let (essay, is_new_thread, thread_id) = feedback_body(complete.clone()).split().unwrap();
        assert_eq!(essay.word_count, Number::from(250));
        assert!(essay.feedback_questions.is_empty());
        assert_eq!(is_new_thread, None);
        assert_eq!(thread_id, None);

        let mut zero = complete;
        zero["word_count"] = json!(0);
        assert!(feedback_body(zero).split().is_err());
    }

    #[test]
    fn missing_essay_text_is_rejected() {
        let body = feedback_body(json!({
            "college_name": "MIT",
            "prompt": "Why us?",
            "word_count": 250,
        }));
        let err = body.split().unwrap_err();
        assert_eq!(err.message, "Missing required fields");
    }

    #[test]
    fn thread_delete_needs_an_id() {
        let params = ThreadParams { thread_id: None };
        assert_eq!(params.thread_id().unwrap_err().message, "Thread ID is required");
    }

    #[test]
    fn backend_fields_override_the_merged_defaults() {
        let merged = merge_thread_response("abc", json!({ "success": false, "messages": [] }));
        assert_eq!(
            merged,
            json!({ "success": false, "thread_id": "abc", "messages": [] })
        );

        let merged = merge_thread_response("abc", Value::Null);
        assert_eq!(merged, json!({ "success": true, "thread_id": "abc" }));
    }

    #[test]
    fn thread_ids_are_unique() {
        assert_ne!(new_thread_id(), new_thread_id());
    }
}
