//! Web API router construction.

use axum::{
    Router,
    http::{HeaderName, Method, StatusCode, header},
    middleware,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::middleware::security_headers::SecurityHeadersLayer;
use crate::web::session::GENERATION_IN_PROGRESS_HEADER;
use crate::web::error::request_timeout_as_json;
use crate::web::{activities, college_list, essays, profile, session, status, subscription};

/// Creates the web server router.
///
/// `request_timeout` bounds every route except the generation routes, whose
/// budget is enforced by their generation guard instead. Subscription checks
/// happen inside the paid handlers, after input validation.
pub fn create_router(app_state: AppState, request_timeout: Duration) -> Router {
    let open_router = Router::new()
        .route("/health", get(status::health))
        .route("/auth/verify-session", get(session::verify_session))
        .route("/auth/verify", get(session::verify))
        .route(
            "/profile",
            get(profile::get_profile)
                .put(profile::update_profile)
                .delete(profile::delete_profile),
        )
        .route("/profile/delete", axum::routing::delete(profile::delete_profile))
        .route(
            "/profile/add-target-college",
            post(profile::add_target_college),
        )
        .route("/profile-evaluation", post(profile::evaluate_profile))
        .route(
            "/subscription",
            get(subscription::raw_status)
                .post(subscription::create)
                .delete(subscription::cancel),
        )
        .route("/subscription/status", get(subscription::status))
        .route(
            "/subscription/create-checkout",
            post(subscription::create_checkout),
        )
        .route("/subscription/portal", post(subscription::portal))
        .route("/subscription/create-portal", post(subscription::portal))
        .route("/subscription/cancel", post(subscription::cancel))
        .route("/subscription/prices", get(subscription::prices))
        .route(
            "/payment/verify-subscription",
            get(subscription::verify_checkout),
        )
        .route(
            "/payment/subscription-status",
            get(subscription::raw_status),
        );

    let generation_router = Router::new()
        .route("/college-list", post(college_list::generate))
        .route("/college-list/generate", post(college_list::regenerate))
        .route("/ec-suggestions", post(activities::generate));

    let paid_router = Router::new()
        .route(
            "/college-list/current-suggestions",
            get(college_list::current_suggestions),
        )
        .route(
            "/college-list/target-colleges",
            get(college_list::target_colleges),
        )
        .route(
            "/college-list/past-suggestions",
            get(college_list::past_suggestions),
        )
        .route("/college-list/add-target", post(college_list::add_target))
        .route(
            "/college-list/delete-college",
            post(college_list::delete_college),
        )
        .route(
            "/ec-suggestions/current-suggestions",
            get(activities::current_suggestions),
        )
        .route(
            "/ec-suggestions/past-suggestions",
            get(activities::past_suggestions),
        )
        .route(
            "/ec-suggestions/target-activities",
            get(activities::target_activities),
        )
        .route("/ec-suggestions/add-target", post(activities::add_target))
        .route(
            "/ec-suggestions/delete-activity",
            post(activities::delete_activity),
        )
        .route("/essay-feedback", post(essays::feedback))
        .route(
            "/essay-feedback/threads",
            get(essays::feedback_threads)
                .post(essays::create_feedback_thread)
                .delete(essays::delete_feedback_thread),
        )
        .route("/essay-brainstorm", post(essays::brainstorm))
        .route(
            "/essay-brainstorm/threads",
            get(essays::brainstorm_threads)
                .post(essays::create_brainstorm_thread)
                .delete(essays::delete_brainstorm_thread),
        );

    let api = open_router
        .merge(paid_router)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::map_response(request_timeout_as_json))
        .merge(generation_router);

    let router = Router::new().nest("/api", api).with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        SecurityHeadersLayer,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        cors_layer(),
    ))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(GENERATION_IN_PROGRESS_HEADER),
        ])
        .expose_headers([HeaderName::from_static("x-request-id"), header::RETRY_AFTER])
}
