//! API usage middleware
//!
//! Records one `ApiUsageEvent` per authenticated analytics request after
//! the handler runs. Anonymous requests are not recorded; there is no
//! user to attribute them to.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::state::AppState;
use crate::types::HttpMethod;

/// Duration cap mirrors the validation bound for external usage payloads
const MAX_TRACKED_DURATION_MS: u128 = 60_000;

pub async fn track_api_usage(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = request.uri().path().to_string();
    let method = HttpMethod::parse(request.method().as_str());
    let claims = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| state.auth.validate_authorization(h).ok());

    let start = Instant::now();
    let response = next.run(request).await;

    if let (Some(claims), Some(method)) = (claims, method) {
        let duration_ms = start.elapsed().as_millis().min(MAX_TRACKED_DURATION_MS) as u32;
        state.writer.track_api_usage(
            &claims.sub,
            &endpoint,
            method,
            response.status().as_u16(),
            duration_ms,
        );
    }

    response
}
