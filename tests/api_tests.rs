//! Integration tests for the analytics HTTP API
//!
//! Each test builds a fresh in-memory state and drives the real router
//! with `tower::ServiceExt::oneshot`, so rate limiting, auth, validation
//! and response shaping are all exercised end to end.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pulse_analytics::api::http::create_router;
use pulse_analytics::api::state::AppState;
use pulse_analytics::config::AppConfig;
use pulse_analytics::store::RecordStore;

const TEST_SECRET: &str = "test-secret-key-that-is-at-least-32-characters-long";

fn test_state() -> Arc<AppState> {
    let config = AppConfig {
        dev_mode: true,
        jwt_secret: Some(TEST_SECRET.to_string()),
        users: vec![("alice@example.com".to_string(), "password123".to_string())],
        ..Default::default()
    };
    let store = Arc::new(RecordStore::in_memory());
    Arc::new(AppState::with_store(config, store).unwrap())
}

fn token_for(state: &AppState, email: &str) -> String {
    let user = state.store.find_user_by_email(email).unwrap();
    state.auth.issue_token(&user).unwrap().access_token
}

fn post_json(uri: &str, token: Option<&str>, ip: &str, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>, ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", ip);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_activity_requires_auth() {
    let state = test_state();
    let app = create_router(state);

    let response = call(
        &app,
        post_json(
            "/analytics/activity",
            None,
            "10.0.0.1",
            json!({"action": "login"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_activity_tracked() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let user_id = state
        .store
        .find_user_by_email("alice@example.com")
        .unwrap()
        .id;
    let app = create_router(state.clone());

    let response = call(
        &app,
        post_json(
            "/analytics/activity",
            Some(&token),
            "10.0.0.2",
            json!({"action": "data_export", "metadata": {"format": "csv"}}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["tracked"]["action"], "data_export");
    assert_eq!(body["tracked"]["userId"], Value::String(user_id.clone()));
    assert_eq!(state.store.count_activities(Some(&user_id)), 1);
}

#[tokio::test]
async fn test_activity_validation_error_lists_issues() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    let response = call(
        &app,
        post_json(
            "/analytics/activity",
            Some(&token),
            "10.0.0.3",
            json!({"action": "has spaces!"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let details = body["details"].as_array().unwrap();
    assert!(details.iter().any(|i| i["field"] == "action"));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_json() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/analytics/activity")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.0.0.4")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from("{not valid"))
        .unwrap();
    let response = call(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_JSON");
}

#[tokio::test]
async fn test_anonymous_page_view_tracked() {
    let state = test_state();
    let app = create_router(state.clone());

    let response = call(
        &app,
        post_json(
            "/analytics/page-view",
            None,
            "10.0.0.5",
            json!({"page": "/pricing", "userAgent": "Mozilla/5.0"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tracked"]["page"], "/pricing");
    assert_eq!(body["tracked"]["authenticated"], false);
    assert_eq!(state.store.count_page_views(None), 1);
}

#[tokio::test]
async fn test_page_view_must_start_with_slash() {
    let state = test_state();
    let app = create_router(state);

    let response = call(
        &app,
        post_json(
            "/analytics/page-view",
            None,
            "10.0.0.6",
            json!({"page": "pricing"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_activity_rate_limit_blocks_51st_request() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    for _ in 0..50 {
        let response = call(
            &app,
            post_json(
                "/analytics/activity",
                Some(&token),
                "198.51.100.7",
                json!({"action": "login"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = call(
        &app,
        post_json(
            "/analytics/activity",
            Some(&token),
            "198.51.100.7",
            json!({"action": "login"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-limit"], "50");
    assert_eq!(response.headers()["retry-after"], "300");
    let body = body_json(response).await;
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["retryAfter"], 300);
}

#[tokio::test]
async fn test_rate_limit_is_per_ip() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    for _ in 0..=50 {
        let _ = call(
            &app,
            post_json(
                "/analytics/activity",
                Some(&token),
                "198.51.100.8",
                json!({"action": "login"}),
            ),
        )
        .await;
    }

    let other_ip = call(
        &app,
        post_json(
            "/analytics/activity",
            Some(&token),
            "198.51.100.9",
            json!({"action": "login"}),
        ),
    )
    .await;
    assert_eq!(other_ip.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_batch_processes_valid_subset() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let user_id = state
        .store
        .find_user_by_email("alice@example.com")
        .unwrap()
        .id;
    let app = create_router(state.clone());

    let response = call(
        &app,
        post_json(
            "/analytics/batch",
            Some(&token),
            "10.0.0.10",
            json!({
                "type": "activities",
                "data": [
                    {"userId": user_id, "action": "login"},
                    {"userId": "usr_999999", "action": "login"},
                ]
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "activities");
    assert_eq!(body["processed"], 1);
    assert_eq!(state.store.count_activities(Some(&user_id)), 1);
}

#[tokio::test]
async fn test_batch_rejects_oversized_payload() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    let too_many: Vec<Value> = (0..51)
        .map(|i| json!({"userId": "u1", "action": format!("a{}", i)}))
        .collect();
    let response = call(
        &app,
        post_json(
            "/analytics/batch",
            Some(&token),
            "10.0.0.11",
            json!({"type": "activities", "data": too_many}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stats_offset_pagination() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let user_id = state
        .store
        .find_user_by_email("alice@example.com")
        .unwrap()
        .id;
    for i in 0..25 {
        state
            .store
            .insert_activity(&user_id, &format!("action_{:02}", i), None)
            .unwrap();
    }
    let app = create_router(state);

    let response = call(
        &app,
        get(
            "/analytics/stats?type=activity&page=2&limit=10",
            Some(&token),
            "10.0.0.12",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "activity");
    let data = body["data"]["data"].as_array().unwrap();
    assert_eq!(data.len(), 10);
    // Newest first: page 2 of 10 starts at the 11th most recent
    assert_eq!(data[0]["action"], "action_14");
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["page"], 2);
    assert_eq!(pagination["total"], 25);
    assert_eq!(pagination["hasPrev"], true);
    assert_eq!(pagination["hasNext"], true);
}

#[tokio::test]
async fn test_stats_cursor_pagination() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let user_id = state
        .store
        .find_user_by_email("alice@example.com")
        .unwrap()
        .id;
    for i in 0..5 {
        state
            .store
            .insert_activity(&user_id, &format!("action_{}", i), None)
            .unwrap();
    }
    let app = create_router(state);

    let first = body_json(
        call(
            &app,
            get(
                "/analytics/stats?type=activity&limit=2",
                Some(&token),
                "10.0.0.13",
            ),
        )
        .await,
    )
    .await;
    // First page is offset mode; its last row's id is the cursor
    let cursor = first["data"]["data"][1]["id"].as_str().unwrap().to_string();

    let next = body_json(
        call(
            &app,
            get(
                &format!("/analytics/stats?type=activity&limit=2&cursor={}", cursor),
                Some(&token),
                "10.0.0.13",
            ),
        )
        .await,
    )
    .await;

    let data = next["data"]["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["action"], "action_2");
    assert_eq!(next["data"]["pagination"]["hasMore"], true);
}

#[tokio::test]
async fn test_stats_requires_type() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    let response = call(&app, get("/analytics/stats", Some(&token), "10.0.0.14")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stats_daily_includes_days_metadata() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let app = create_router(state);

    let response = call(
        &app,
        get(
            "/analytics/stats?type=daily&days=14",
            Some(&token),
            "10.0.0.15",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["metadata"]["days"], 14);
}

#[tokio::test]
async fn test_token_endpoint_issues_and_rejects() {
    let state = test_state();
    let app = create_router(state);

    let ok = call(
        &app,
        post_json(
            "/auth/token",
            None,
            "10.0.0.16",
            json!({"email": "alice@example.com", "password": "password123"}),
        ),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = body_json(ok).await;
    assert!(!body["accessToken"].as_str().unwrap().is_empty());
    assert_eq!(body["tokenType"], "Bearer");

    let bad = call(
        &app,
        post_json(
            "/auth/token",
            None,
            "10.0.0.16",
            json!({"email": "alice@example.com", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_simulate_activity_records_enriched_event() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let user_id = state
        .store
        .find_user_by_email("alice@example.com")
        .unwrap()
        .id;
    let app = create_router(state.clone());

    let response = call(
        &app,
        post_json(
            "/analytics/simulate-activity",
            Some(&token),
            "10.0.0.17",
            json!({"action": "demo_click"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["action"], "demo_click");
    assert_eq!(body["data"]["simulated"], true);
    assert_eq!(state.store.count_activities(Some(&user_id)), 1);
}

#[tokio::test]
async fn test_usage_middleware_records_authenticated_calls() {
    let state = test_state();
    let token = token_for(&state, "alice@example.com");
    let user_id = state
        .store
        .find_user_by_email("alice@example.com")
        .unwrap()
        .id;
    let app = create_router(state.clone());

    let _ = call(
        &app,
        post_json(
            "/analytics/activity",
            Some(&token),
            "10.0.0.18",
            json!({"action": "login"}),
        ),
    )
    .await;

    let usage = state.store.api_performance_by_endpoint(Some(&user_id));
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].endpoint, "/analytics/activity");
    assert_eq!(usage[0].count, 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = test_state();
    let app = create_router(state);

    let response = call(&app, get("/health", None, "10.0.0.19")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "pulse-analytics");
}
