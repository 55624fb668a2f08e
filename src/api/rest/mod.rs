//! REST handlers for the analytics endpoints
//!
//! Every handler follows the same pipeline: rate limit, identity,
//! body parse, validation, then the writer or reader. Helpers here keep
//! the error responses uniform across endpoints.

pub mod activity;
pub mod batch;
pub mod page_view;
pub mod simulate;
pub mod stats;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::auth::Claims;
use super::state::AppState;
use super::ApiError;
use crate::rate_limit::RateLimitExceeded;

pub(crate) fn json_error(status: StatusCode, error: ApiError) -> Response {
    (status, Json(error)).into_response()
}

/// 429 with backoff headers and a numeric `retryAfter` in the body
pub(crate) fn rate_limited_response(exceeded: &RateLimitExceeded) -> Response {
    let body = json!({
        "error": "Too many requests, please try again later.",
        "code": "RATE_LIMITED",
        "retryAfter": exceeded.retry_after_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    let pairs = [
        ("retry-after", exceeded.retry_after_secs.to_string()),
        ("x-ratelimit-limit", exceeded.limit.to_string()),
        ("x-ratelimit-remaining", exceeded.remaining.to_string()),
        ("x-ratelimit-reset", exceeded.reset.to_rfc3339()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    response
}

/// Resolve the caller's identity from the Authorization header, if any.
/// Invalid or expired tokens count as anonymous.
pub(crate) fn identity(state: &AppState, headers: &HeaderMap) -> Option<Claims> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| state.auth.validate_authorization(h).ok())
}

/// Identity or a ready-made 401
pub(crate) fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<Claims, Response> {
    identity(state, headers).ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            ApiError::auth_required(Some("Authentication required")),
        )
    })
}

/// Parse the raw body as JSON or produce the 400 `INVALID_JSON` response
pub(crate) fn parse_json(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body)
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, ApiError::invalid_json()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_rate_limited_response_headers() {
        let exceeded = RateLimitExceeded {
            limit: 50,
            remaining: 0,
            retry_after_secs: 300,
            reset: Utc::now(),
        };

        let response = rate_limited_response(&exceeded);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "300");
        assert_eq!(response.headers()["x-ratelimit-limit"], "50");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        assert!(parse_json(&Bytes::from_static(b"{not json")).is_err());
        assert!(parse_json(&Bytes::from_static(b"{\"a\":1}")).is_ok());
    }
}
