//! Router assembly
//!
//! All `/analytics/*` routes share the usage-tracking middleware; the
//! health and token routes sit outside it.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{self, json_error, parse_json};
use super::state::AppState;
use super::usage;
use super::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    let analytics = Router::new()
        .route("/analytics/activity", post(rest::activity::track_activity))
        .route(
            "/analytics/page-view",
            post(rest::page_view::track_page_view),
        )
        .route("/analytics/batch", post(rest::batch::track_batch))
        .route(
            "/analytics/simulate-activity",
            post(rest::simulate::simulate_activity),
        )
        .route("/analytics/stats", get(rest::stats::get_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            usage::track_api_usage,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/auth/token", post(issue_token))
        .merge(analytics)
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": crate::NAME,
            "version": crate::VERSION,
            "timestamp": crate::utils::now_rfc3339(),
            "metrics": state.metrics.snapshot(),
        })),
    )
        .into_response()
}

/// `POST /auth/token` with `{email, password}`
async fn issue_token(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let payload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let email = payload.get("email").and_then(Value::as_str).unwrap_or("");
    let password = payload
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or("");

    let user = match state.auth.authenticate(&state.store, email, password) {
        Ok(user) => user,
        Err(_) => {
            state.metrics.increment("api.auth.rejected");
            return json_error(
                StatusCode::UNAUTHORIZED,
                ApiError::auth_required(Some("Invalid email or password")),
            );
        }
    };

    match state.auth.issue_token(&user) {
        Ok(tokens) => {
            state.metrics.increment("api.auth.issued");
            (StatusCode::OK, Json(tokens)).into_response()
        }
        Err(e) => {
            state.logger.error("Failed to issue token", &e);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal(
                    "Failed to issue token",
                    "TOKEN_ERROR",
                    state.config.dev_mode,
                    Some(e.to_string()),
                ),
            )
        }
    }
}
