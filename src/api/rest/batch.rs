//! `POST /analytics/batch`
//!
//! Unlike the single-event endpoints, batch failures surface to the
//! caller: a store error here is a 500 `BATCH_ERROR`, not a silent drop.

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
use crate::logging::metrics::measure;
use crate::rate_limit::{client_key, LimiterClass};
use crate::validation::{sanitize_ip, validate_batch, BatchInput};

pub async fn track_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = client_key(&headers);
    let logger = api_logger(
        state.config.dev_mode,
        "/analytics/batch",
        &sanitize_ip(&key),
    );

    if let Err(exceeded) = state.limiter.check(&key, LimiterClass::GenericApi) {
        state.metrics.increment("api.batch.rate_limited");
        logger.warn("Rate limit exceeded for batch tracking");
        return rate_limited_response(&exceeded);
    }

    if let Err(response) = require_auth(&state, &headers) {
        return response;
    }

    let payload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let batch = match validate_batch(&payload) {
        Ok(batch) => batch,
        Err(err) => {
            state.metrics.increment("api.batch.validation_error");
            logger.warn(&format!("Batch validation failed: {}", err));
            return json_error(StatusCode::BAD_REQUEST, ApiError::validation(&err));
        }
    };

    let type_name = batch.type_name();
    let result = measure(&state.metrics, "api.batch", || async {
        match &batch {
            BatchInput::PageViews(records) => state.writer.track_page_views_batch(records),
            BatchInput::Activities(records) => state.writer.track_activities_batch(records),
        }
    })
    .await;

    match result {
        Ok(processed) => {
            state.metrics.increment("api.batch.success");
            logger.info(&format!(
                "Processed batch of {} {}",
                processed, type_name
            ));
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "type": type_name,
                    "processed": processed,
                    "message": format!("Successfully processed {} events", processed),
                })),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.increment("api.batch.error");
            logger.error("Batch processing failed", &e);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal(
                    "Batch processing failed",
                    "BATCH_ERROR",
                    state.config.dev_mode,
                    Some(e.to_string()),
                ),
            )
        }
    }
}
