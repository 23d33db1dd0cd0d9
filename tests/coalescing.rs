//! End-to-end coalescing behaviour: session and profile freshness caches and
//! the per-subject generation guards.

mod helpers;

use axum::http::{Method, StatusCode, header};
use helpers::*;
use serde_json::json;
use std::time::Duration;

fn verified(email: &str) -> serde_json::Value {
    json!({ "success": true, "user": { "email": email, "name": "Alice" } })
}

#[tokio::test(start_paused = true)]
async fn session_verification_is_served_from_cache_within_ttl() {
    let backend = MockBackend::new();
    backend.always("auth.verify_session", verified("alice@example.com"));
    let app = router(backend.clone());
    let token = alice();

    let first = send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["user"]["email"], "alice@example.com");

    tokio::time::advance(Duration::from_secs(299)).await;
    let second = send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(second.body, first.body);
    assert_eq!(backend.count("auth.verify_session"), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(backend.count("auth.verify_session"), 2);
}

#[tokio::test(start_paused = true)]
async fn generation_header_accepts_stale_session() {
    let backend = MockBackend::new();
    backend.always("auth.verify_session", verified("alice@example.com"));
    let app = router(backend.clone());
    let token = alice();

    send(&app, get("/api/auth/verify-session", &token)).await;
    tokio::time::advance(Duration::from_secs(60 * 60)).await;

    let mut request = get("/api/auth/verify-session", &token);
    request
        .headers_mut()
        .insert("x-generation-in-progress", "true".parse().unwrap());
    let reply = send(&app, request).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(backend.count("auth.verify_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn generation_header_without_cached_entry_fetches() {
    let backend = MockBackend::new();
    backend.always("auth.verify_session", verified("alice@example.com"));
    let app = router(backend.clone());

    let mut request = get("/api/auth/verify-session", &alice());
    request
        .headers_mut()
        .insert("x-generation-in-progress", "true".parse().unwrap());
    let reply = send(&app, request).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(backend.count("auth.verify_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_and_failed_verifications_are_not_cached() {
    let backend = MockBackend::new();
    let app = router(backend.clone());
    let token = alice();

    backend.once(
        "auth.verify_session",
        Ok(json!({ "success": false, "error": "Token revoked" })),
    );
    let rejected = send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.body["success"], false);

    backend.fail_once("auth.verify_session", 502, "Bad gateway");
    let failed = send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);

    backend.always("auth.verify_session", verified("alice@example.com"));
    let ok = send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(ok.body["success"], true);
    assert_eq!(backend.count("auth.verify_session"), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_the_stale_entry() {
    let backend = MockBackend::new();
    backend.always("auth.verify_session", verified("alice@example.com"));
    let app = router(backend.clone());
    let token = alice();

    send(&app, get("/api/auth/verify-session", &token)).await;
    tokio::time::advance(Duration::from_secs(301)).await;

    backend.fail_once("auth.verify_session", 500, "Backend down");
    let failed = send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);

    let mut request = get("/api/auth/verify-session", &token);
    request
        .headers_mut()
        .insert("x-generation-in-progress", "true".parse().unwrap());
    let stale = send(&app, request).await;
    assert_eq!(stale.status, StatusCode::OK);
    assert_eq!(stale.body["user"]["email"], "alice@example.com");
    assert_eq!(backend.count("auth.verify_session"), 2);
}

#[tokio::test(start_paused = true)]
async fn profile_is_cached_per_subject() {
    let backend = MockBackend::new();
    backend.always(
        "profile.get",
        json!({ "success": true, "profile": { "gpa": 3.9 } }),
    );
    let app = router(backend.clone());

    send(&app, get("/api/profile", &alice())).await;
    send(&app, get("/api/profile", &alice())).await;
    assert_eq!(backend.count("profile.get"), 1);

    send(&app, get("/api/profile", &bob())).await;
    assert_eq!(backend.count("profile.get"), 2);

    tokio::time::advance(Duration::from_secs(31)).await;
    let reply = send(&app, get("/api/profile", &alice())).await;
    assert_eq!(reply.body, json!({ "success": true, "profile": { "gpa": 3.9 } }));
    assert_eq!(backend.count("profile.get"), 3);
}

#[tokio::test(start_paused = true)]
async fn profile_write_invalidates_before_next_read() {
    let backend = MockBackend::new();
    backend.always(
        "profile.get",
        json!({ "success": true, "profile": { "gpa": 3.9 } }),
    );
    let app = router(backend.clone());
    let token = alice();

    send(&app, get("/api/profile", &token)).await;

    let update = request(
        Method::PUT,
        "/api/profile",
        Some(&token),
        Some(json!({ "gpa": 4.0 })),
    );
    let reply = send(&app, update).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(backend.last("profile.update").unwrap().body, Some(json!({ "gpa": 4.0 })));

    backend.always(
        "profile.get",
        json!({ "success": true, "profile": { "gpa": 4.0 } }),
    );
    let reply = send(&app, get("/api/profile", &token)).await;
    assert_eq!(reply.body["profile"]["gpa"], 4.0);
    assert_eq!(backend.count("profile.get"), 2);
}

#[tokio::test(start_paused = true)]
async fn profile_delete_clears_session_cache_too() {
    let backend = MockBackend::new();
    backend.always("auth.verify_session", verified("alice@example.com"));
    let app = router(backend.clone());
    let token = alice();

    send(&app, get("/api/auth/verify-session", &token)).await;
    let reply = send(&app, request(Method::DELETE, "/api/profile", Some(&token), None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(backend.last("profile.delete").unwrap().body, Some(json!({})));

    send(&app, get("/api/auth/verify-session", &token)).await;
    assert_eq!(backend.count("auth.verify_session"), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_generation_is_coalesced() {
    let backend = MockBackend::new();
    let release = backend.hold("college_list.generate");
    backend.once(
        "college_list.generate",
        Ok(json!({ "success": true, "colleges": ["MIT"] })),
    );
    let app = router(backend.clone());
    let token = alice();

    let first = tokio::spawn({
        let app = app.clone();
        let token = token.clone();
        async move {
            send(&app, post("/api/college-list", &token, json!({ "type": "reach" }))).await
        }
    });
    backend.wait_for("college_list.generate", 1).await;

    let second = send(&app, post("/api/college-list", &token, json!({ "type": "safety" }))).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(
        second.body,
        json!({ "success": true, "message": "Generation in progress" })
    );

    release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["colleges"], json!(["MIT"]));
    assert_eq!(backend.count("college_list.generate"), 1);
    assert_eq!(
        backend.last("college_list.generate").unwrap().body,
        Some(json!({ "auth0_id": "google-oauth2|alice", "college_type": "reach" }))
    );

    release.notify_one();
    let third = send(&app, post("/api/college-list", &token, json!({ "type": "target" }))).await;
    assert_eq!(third.status, StatusCode::OK);
    assert_eq!(backend.count("college_list.generate"), 2);
}

#[tokio::test(start_paused = true)]
async fn generation_guard_is_per_subject() {
    let backend = MockBackend::new();
    let release = backend.hold("activities.generate");
    let app = router(backend.clone());
    let body = json!({ "activity_type": "Research", "hrs_per_wk": "6" });

    let alice_run = tokio::spawn({
        let (app, body) = (app.clone(), body.clone());
        async move { send(&app, post("/api/ec-suggestions", &alice(), body)).await }
    });
    let bob_run = tokio::spawn({
        let (app, body) = (app.clone(), body.clone());
        async move { send(&app, post("/api/ec-suggestions", &bob(), body)).await }
    });
    backend.wait_for("activities.generate", 2).await;

    release.notify_one();
    release.notify_one();
    assert_eq!(alice_run.await.unwrap().status, StatusCode::OK);
    assert_eq!(bob_run.await.unwrap().status, StatusCode::OK);
    assert_eq!(
        backend.last("activities.generate").unwrap().body,
        Some(json!({ "activity_type": "Research", "hrs_per_wk": 6 }))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_generation_releases_the_guard() {
    let backend = MockBackend::new();
    backend.fail_once("college_list.generate", 500, "Model overloaded");
    let app = router(backend.clone());
    let token = alice();

    let failed = send(&app, post("/api/college-list", &token, json!({ "type": "reach" }))).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.body["error"], "Model overloaded");

    let retried = send(&app, post("/api/college-list", &token, json!({ "type": "reach" }))).await;
    assert_eq!(retried.status, StatusCode::OK);
    assert_eq!(backend.count("college_list.generate"), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_generation_times_out_and_releases() {
    let backend = MockBackend::new();
    let _never = backend.hold("college_list.generate");
    let app = router(backend.clone());
    let token = alice();

    let timed_out =
        send(&app, post("/api/college-list", &token, json!({ "type": "reach" }))).await;
    assert_eq!(timed_out.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(timed_out.body["code"], "GENERATION_TIMEOUT");
    assert_eq!(timed_out.body["retryable"], true);
    assert_eq!(timed_out.headers.get(header::RETRY_AFTER).unwrap(), "30");

    // A new request is allowed to claim again rather than seeing "in progress".
    let second = tokio::spawn({
        let (app, token) = (app.clone(), token.clone());
        async move { send(&app, post("/api/college-list", &token, json!({ "type": "reach" }))).await }
    });
    backend.wait_for("college_list.generate", 2).await;
    assert_eq!(second.await.unwrap().status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn invalid_input_never_claims_the_guard() {
    let backend = MockBackend::new();
    let app = router(backend.clone());
    let token = alice();

    for body in [json!({}), json!({ "type": "dream" }), json!({ "type": 3 })] {
        let reply = send(&app, post("/api/college-list", &token, body)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"], "Invalid college type");
    }

    let reply = send(
        &app,
        post("/api/ec-suggestions", &token, json!({ "activity_type": "Art", "hrs_per_wk": 0 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Missing required fields");

    assert_eq!(backend.count("college_list.generate"), 0);
    assert_eq!(backend.count("activities.generate"), 0);
    assert_eq!(backend.count("payment.status"), 0);

    let ok = send(&app, post("/api/college-list", &token, json!({ "type": "safety" }))).await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn bodyless_regeneration_shares_the_college_guard() {
    let backend = MockBackend::new();
    let release = backend.hold("college_list.regenerate");
    let app = router(backend.clone());
    let token = alice();

    let first = tokio::spawn({
        let (app, token) = (app.clone(), token.clone());
        async move {
            send(
                &app,
                request(Method::POST, "/api/college-list/generate", Some(&token), None),
            )
            .await
        }
    });
    backend.wait_for("college_list.regenerate", 1).await;

    let typed = send(&app, post("/api/college-list", &token, json!({ "type": "reach" }))).await;
    assert_eq!(
        typed.body,
        json!({ "success": true, "message": "Generation in progress" })
    );
    assert_eq!(backend.count("college_list.generate"), 0);

    release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.status, StatusCode::OK);

    let call = backend.last("college_list.regenerate").unwrap();
    assert_eq!(call.path, "/api/college-list/generate");
    assert_eq!(call.body, None);
}

#[tokio::test(start_paused = true)]
async fn rejected_profile_write_still_drops_cached_profile() {
    let backend = MockBackend::new();
    backend.always(
        "profile.get",
        json!({ "success": true, "profile": { "gpa": 3.9 } }),
    );
    let app = router(backend.clone());
    let token = alice();

    send(&app, get("/api/profile", &token)).await;

    let malformed = axum::http::Request::builder()
        .method(Method::PUT)
        .uri("/api/profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{\"gpa\": "))
        .unwrap();
    let reply = send(&app, malformed).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(backend.count("profile.update"), 0);

    send(&app, get("/api/profile", &token)).await;
    assert_eq!(backend.count("profile.get"), 2);
}
