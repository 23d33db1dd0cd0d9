//! Typed upstream operations, one variant per Backend API endpoint.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Which band of the college list to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollegeType {
    Safety,
    Target,
    Reach,
}

impl CollegeType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "safety" => Some(Self::Safety),
            "target" => Some(Self::Target),
            "reach" => Some(Self::Reach),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollegeListRequest {
    pub auth0_id: String,
    pub college_type: CollegeType,
}

/// A college on one of the subject's lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollegeRef {
    pub college_name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRequest {
    pub activity_type: String,
    pub hrs_per_wk: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityData {
    pub name: String,
    pub description: String,
    pub hours_per_week: Number,
    pub activity_type: String,
    pub position: String,
    pub added_at: DateTime<Utc>,
}

/// Where a newly targeted activity is filed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSource {
    /// Picked from the current (unsaved) suggestion batch.
    Temp,
    Permanent,
}

impl TargetSource {
    pub fn from_client(source: &str) -> Self {
        if source == "current" {
            Self::Temp
        } else {
            Self::Permanent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddActivityRequest {
    pub activity_name: String,
    pub activity_data: ActivityData,
    pub source: TargetSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySource {
    Current,
    Past,
    Target,
}

impl ActivitySource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "current" => Some(Self::Current),
            "past" => Some(Self::Past),
            "target" => Some(Self::Target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteActivityRequest {
    pub activity_name: String,
    pub source: ActivitySource,
}

/// Pagination forwarded as a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: Option<u32>,
}

impl Page {
    fn query(&self) -> String {
        match self.per_page {
            Some(per_page) => format!("page={}&per_page={per_page}", self.page),
            None => format!("page={}", self.page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EssayFeedbackRequest {
    pub college_name: String,
    pub prompt: String,
    pub essay_text: String,
    pub word_count: Number,
    pub feedback_questions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_thread: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub auth0_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackThread {
    pub thread_id: String,
    pub college_name: String,
    pub prompt: String,
    pub essay_text: String,
    pub word_count: Number,
    pub feedback_questions: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EssayBrainstormRequest {
    pub college_name: String,
    pub essay_prompt: String,
    /// `null` upstream when the client sent nothing numeric.
    pub word_limit: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_thread: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub auth0_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrainstormThread {
    pub thread_id: String,
    pub college_name: String,
    pub essay_prompt: String,
    pub word_limit: Number,
}

/// One call against the Backend API.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    VerifySession,
    GetProfile,
    UpdateProfile(Map<String, Value>),
    DeleteProfile,
    EvaluateProfile,

    GenerateCollegeList(CollegeListRequest),
    /// Body-less generation; the backend picks the list type.
    RegenerateCollegeList,
    CurrentCollegeSuggestions,
    TargetColleges(Page),
    PastCollegeSuggestions,
    AddTargetCollege(CollegeRef),
    DeleteCollege(CollegeRef),

    GenerateActivities(ActivityRequest),
    CurrentActivitySuggestions,
    PastActivitySuggestions,
    TargetActivities(Page),
    AddTargetActivity(AddActivityRequest),
    DeleteActivity(DeleteActivityRequest),

    EssayFeedback(EssayFeedbackRequest),
    ListFeedbackThreads,
    CreateFeedbackThread(FeedbackThread),
    DeleteFeedbackThread(String),
    EssayBrainstorm(EssayBrainstormRequest),
    ListBrainstormThreads,
    CreateBrainstormThread(BrainstormThread),
    DeleteBrainstormThread(String),

    SubscriptionStatus,
    CreateSubscription { subscription_type: Option<String> },
    CreateCheckout { plan_type: Option<String> },
    CreatePortalSession,
    CancelSubscription,
    Prices,
    VerifyCheckout { session_id: String },
}

impl BackendCall {
    pub fn method(&self) -> Method {
        use BackendCall::*;
        match self {
            VerifySession
            | GetProfile
            | CurrentCollegeSuggestions
            | TargetColleges(_)
            | PastCollegeSuggestions
            | CurrentActivitySuggestions
            | PastActivitySuggestions
            | TargetActivities(_)
            | ListFeedbackThreads
            | ListBrainstormThreads
            | SubscriptionStatus
            | Prices
            | VerifyCheckout { .. } => Method::GET,
            UpdateProfile(_) => Method::PUT,
            DeleteProfile | DeleteFeedbackThread(_) | DeleteBrainstormThread(_) => Method::DELETE,
            EvaluateProfile
            | GenerateCollegeList(_)
            | RegenerateCollegeList
            | AddTargetCollege(_)
            | DeleteCollege(_)
            | GenerateActivities(_)
            | AddTargetActivity(_)
            | DeleteActivity(_)
            | EssayFeedback(_)
            | CreateFeedbackThread(_)
            | EssayBrainstorm(_)
            | CreateBrainstormThread(_)
            | CreateSubscription { .. }
            | CreateCheckout { .. }
            | CreatePortalSession
            | CancelSubscription => Method::POST,
        }
    }

    /// Path and query relative to the backend base URL.
    pub fn path(&self) -> String {
        use BackendCall::*;
        match self {
            VerifySession => "/api/auth/verify-session".into(),
            GetProfile => "/api/profile/".into(),
            UpdateProfile(_) | DeleteProfile => "/api/profile".into(),
            EvaluateProfile => "/api/profile-evaluation/".into(),

            GenerateCollegeList(_) => "/api/college-list/".into(),
            RegenerateCollegeList => "/api/college-list/generate".into(),
            CurrentCollegeSuggestions => "/api/college-list/current-suggestions".into(),
            TargetColleges(page) => format!("/api/college-list/target-colleges?{}", page.query()),
            PastCollegeSuggestions => "/api/college-list/past-suggestions".into(),
            AddTargetCollege(_) => "/api/college-list/add-target".into(),
            DeleteCollege(_) => "/api/college-list/delete-college".into(),

            GenerateActivities(_) => "/api/ec-recommendation/".into(),
            CurrentActivitySuggestions => "/api/ec-recommendation/current-suggestions".into(),
            PastActivitySuggestions => "/api/ec-recommendation/past-suggestions".into(),
            TargetActivities(page) => {
                format!("/api/ec-recommendation/target-activities?{}", page.query())
            }
            AddTargetActivity(_) => "/api/ec-recommendation/add-target".into(),
            DeleteActivity(_) => "/api/ec-recommendation/delete-activity".into(),

            EssayFeedback(_) => "/api/essay-feedback".into(),
            ListFeedbackThreads | CreateFeedbackThread(_) => "/api/essay-feedback/threads".into(),
            DeleteFeedbackThread(id) => format!(
                "/api/essay-feedback/threads/{}",
                urlencoding::encode(id)
            ),
            EssayBrainstorm(_) => "/api/essay-brainstorm".into(),
            ListBrainstormThreads | CreateBrainstormThread(_) => {
                "/api/essay-brainstorm/threads".into()
            }
            DeleteBrainstormThread(id) => format!(
                "/api/essay-brainstorm/threads/{}",
                urlencoding::encode(id)
            ),

            SubscriptionStatus => "/api/payment/subscription-status".into(),
            CreateSubscription { .. } => "/api/payment/create-subscription".into(),
            CreateCheckout { .. } => "/api/payment/create-checkout".into(),
            CreatePortalSession => "/api/payment/create-portal-session".into(),
            CancelSubscription => "/api/payment/cancel-subscription".into(),
            Prices => "/api/payment/prices".into(),
            VerifyCheckout { session_id } => format!(
                "/api/payment/verify-subscription?session_id={}",
                urlencoding::encode(session_id)
            ),
        }
    }

    /// JSON request body, if the operation sends one.
    pub fn body(&self) -> serde_json::Result<Option<Value>> {
        use BackendCall::*;
        let body = match self {
            UpdateProfile(fields) => Value::Object(fields.clone()),
            DeleteProfile => Value::Object(Map::new()),
            GenerateCollegeList(req) => serde_json::to_value(req)?,
            AddTargetCollege(college) | DeleteCollege(college) => serde_json::to_value(college)?,
            GenerateActivities(req) => serde_json::to_value(req)?,
            AddTargetActivity(req) => serde_json::to_value(req)?,
            DeleteActivity(req) => serde_json::to_value(req)?,
            EssayFeedback(req) => serde_json::to_value(req)?,
            CreateFeedbackThread(thread) => serde_json::to_value(thread)?,
            EssayBrainstorm(req) => serde_json::to_value(req)?,
            CreateBrainstormThread(thread) => serde_json::to_value(thread)?,
            CreateSubscription { subscription_type } => {
                serde_json::json!({ "subscription_type": subscription_type })
            }
            CreateCheckout { plan_type } => serde_json::json!({ "plan_type": plan_type }),
            _ => return Ok(None),
        };
        Ok(Some(body))
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        use BackendCall::*;
        match self {
            VerifySession => "auth.verify_session",
            GetProfile => "profile.get",
            UpdateProfile(_) => "profile.update",
            DeleteProfile => "profile.delete",
            EvaluateProfile => "profile.evaluate",
            GenerateCollegeList(_) => "college_list.generate",
            RegenerateCollegeList => "college_list.regenerate",
            CurrentCollegeSuggestions => "college_list.current",
            TargetColleges(_) => "college_list.target",
            PastCollegeSuggestions => "college_list.past",
            AddTargetCollege(_) => "college_list.add_target",
            DeleteCollege(_) => "college_list.delete",
            GenerateActivities(_) => "activities.generate",
            CurrentActivitySuggestions => "activities.current",
            PastActivitySuggestions => "activities.past",
            TargetActivities(_) => "activities.target",
            AddTargetActivity(_) => "activities.add_target",
            DeleteActivity(_) => "activities.delete",
            EssayFeedback(_) => "essay_feedback.submit",
            ListFeedbackThreads => "essay_feedback.threads",
            CreateFeedbackThread(_) => "essay_feedback.create_thread",
            DeleteFeedbackThread(_) => "essay_feedback.delete_thread",
            EssayBrainstorm(_) => "essay_brainstorm.submit",
            ListBrainstormThreads => "essay_brainstorm.threads",
            CreateBrainstormThread(_) => "essay_brainstorm.create_thread",
            DeleteBrainstormThread(_) => "essay_brainstorm.delete_thread",
            SubscriptionStatus => "payment.status",
            CreateSubscription { .. } => "payment.create_subscription",
            CreateCheckout { .. } => "payment.create_checkout",
            CreatePortalSession => "payment.portal",
            CancelSubscription => "payment.cancel",
            Prices => "payment.prices",
            VerifyCheckout { .. } => "payment.verify_checkout",
        }
    }

    /// Long-running generations are bounded by the generation guard rather
    /// than the per-request upstream timeout.
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            BackendCall::GenerateCollegeList(_)
                | BackendCall::RegenerateCollegeList
                | BackendCall::GenerateActivities(_)
        )
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, BackendCall::Prices)
    }
}
