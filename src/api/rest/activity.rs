//! `POST /analytics/activity`

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::{json_error, parse_json, rate_limited_response, require_auth};
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::logging::api_logger;
use crate::rate_limit::{client_key, LimiterClass};
use crate::utils::now_rfc3339;
use crate::validation::{sanitize_ip, validate_activity};

pub async fn track_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = client_key(&headers);
    let logger = api_logger(
        state.config.dev_mode,
        "/analytics/activity",
        &sanitize_ip(&key),
    );

    if let Err(exceeded) = state.limiter.check(&key, LimiterClass::Activity) {
        state.metrics.increment("api.activity.rate_limited");
        logger.warn("Rate limit exceeded for activity tracking");
        return rate_limited_response(&exceeded);
    }

    let claims = match require_auth(&state, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let payload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let input = match validate_activity(&payload) {
        Ok(input) => input,
        Err(err) => {
            state.metrics.increment("api.activity.validation_error");
            logger.warn(&format!("Activity validation failed: {}", err));
            return json_error(StatusCode::BAD_REQUEST, ApiError::validation(&err));
        }
    };

    let timestamp = now_rfc3339();
    state
        .writer
        .track_activity(&claims.sub, &input.action, input.metadata);
    state.metrics.increment("api.activity.success");
    logger
        .with_field("userId", claims.sub.clone())
        .info(&format!("Tracked activity: {}", input.action));

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "tracked": {
                "action": input.action,
                "timestamp": timestamp,
                "userId": claims.sub,
            }
        })),
    )
        .into_response()
}
