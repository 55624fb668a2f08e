//! `POST /analytics/simulate-activity`
//!
//! Development helper for exercising the dashboard without real traffic.
//! Records one activity for the caller with enriched metadata marking it
//! as simulated. An empty body is allowed and defaults everything.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use super::{json_error, parse_json, rate_limited_response, require_auth};
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::logging::api_logger;
use crate::rate_limit::{client_key, LimiterClass};
use crate::utils::now_rfc3339;
use crate::validation::{
    is_valid_action, sanitize_ip, sanitize_user_agent, FieldIssue, ValidationError,
};

const DEFAULT_ACTION: &str = "simulated_activity";

pub async fn simulate_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = client_key(&headers);
    let ip = sanitize_ip(&key);
    let logger = api_logger(state.config.dev_mode, "/analytics/simulate-activity", &ip);

    if let Err(exceeded) = state.limiter.check(&key, LimiterClass::Activity) {
        state.metrics.increment("api.simulate.rate_limited");
        return rate_limited_response(&exceeded);
    }

    let claims = match require_auth(&state, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let payload = if body.is_empty() {
        json!({})
    } else {
        match parse_json(&body) {
            Ok(payload) => payload,
            Err(response) => return response,
        }
    };

    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ACTION);

    if action.len() > 100 || !is_valid_action(action) {
        let err = ValidationError {
            issues: vec![FieldIssue {
                field: "action".to_string(),
                message: "Action contains invalid characters".to_string(),
            }],
        };
        return json_error(StatusCode::BAD_REQUEST, ApiError::validation(&err));
    }

    // Tokens always reference an existing user, but a wiped data directory
    // can orphan them; re-create the row from the claims in that case.
    let user = match state.store.get_user(&claims.sub) {
        Some(user) => user,
        None => match state.store.ensure_user(&claims.email, None, None) {
            Ok(user) => user,
            Err(e) => {
                logger.error("Failed to resolve simulation user", &e);
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::internal(
                        "Failed to resolve user",
                        "USER_ERROR",
                        state.config.dev_mode,
                        Some(e.to_string()),
                    ),
                );
            }
        },
    };

    let timestamp = now_rfc3339();
    let mut metadata: Map<String, Value> = payload
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    metadata.insert("simulated".to_string(), json!(true));
    metadata.insert("timestamp".to_string(), json!(timestamp));
    metadata.insert("ip".to_string(), json!(ip));
    if let Some(ua) = headers.get("user-agent").and_then(|v| v.to_str().ok()) {
        metadata.insert("userAgent".to_string(), json!(sanitize_user_agent(ua)));
    }

    state
        .writer
        .track_activity(&user.id, action, Some(Value::Object(metadata)));
    state.metrics.increment("api.simulate.success");
    logger
        .with_field("userId", user.id.clone())
        .info(&format!("Simulated activity: {}", action));

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Activity simulated successfully",
            "data": {
                "action": action,
                "userId": user.id,
                "timestamp": timestamp,
                "simulated": true,
            }
        })),
    )
        .into_response()
}
