//! `POST /analytics/page-view`
//!
//! The only tracking endpoint open to anonymous callers: a missing or
//! invalid token records the view without attribution.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::{identity, json_error, parse_json, rate_limited_response};
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::logging::api_logger;
use crate::rate_limit::{client_key, LimiterClass};
use crate::utils::now_rfc3339;
use crate::validation::{sanitize_ip, validate_page_view};

pub async fn track_page_view(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = client_key(&headers);
    let ip = sanitize_ip(&key);
    let logger = api_logger(state.config.dev_mode, "/analytics/page-view", &ip);

    if let Err(exceeded) = state.limiter.check(&key, LimiterClass::PageView) {
        state.metrics.increment("api.page_view.rate_limited");
        logger.warn("Rate limit exceeded for page view tracking");
        return rate_limited_response(&exceeded);
    }

    let claims = identity(&state, &headers);

    let payload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let input = match validate_page_view(&payload) {
        Ok(input) => input,
        Err(err) => {
            state.metrics.increment("api.page_view.validation_error");
            return json_error(StatusCode::BAD_REQUEST, ApiError::validation(&err));
        }
    };

    let timestamp = now_rfc3339();
    state.writer.track_page_view(
        &input.page,
        claims.as_ref().map(|c| c.sub.as_str()),
        input.user_agent.as_deref(),
        Some(&ip),
    );
    state.metrics.increment("api.page_view.success");
    logger.info(&format!("Tracked page view: {}", input.page));

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "tracked": {
                "page": input.page,
                "timestamp": timestamp,
                "authenticated": claims.is_some(),
            }
        })),
    )
        .into_response()
}
