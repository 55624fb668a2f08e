//! `GET /analytics/stats`
//!
//! One endpoint, four aggregate shapes selected by `type`, all scoped to
//! the authenticated user. Supplying any non-default paging parameter
//! switches `activity` and `pageviews` into their paginated form.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use super::{json_error, rate_limited_response, require_auth};
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::logging::api_logger;
use crate::logging::metrics::measure;
use crate::rate_limit::{client_key, LimiterClass};
use crate::store::{StoreError, StoreResult};
use crate::utils::now_rfc3339;
use crate::validation::{sanitize_ip, validate_stats_query, StatsQuery, StatsType};

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let key = client_key(&headers);
    let logger = api_logger(
        state.config.dev_mode,
        "/analytics/stats",
        &sanitize_ip(&key),
    );

    if let Err(exceeded) = state.limiter.check(&key, LimiterClass::GenericApi) {
        state.metrics.increment("api.stats.rate_limited");
        logger.warn("Rate limit exceeded for stats");
        return rate_limited_response(&exceeded);
    }

    let claims = match require_auth(&state, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = match validate_stats_query(&params) {
        Ok(query) => query,
        Err(err) => {
            state.metrics.increment("api.stats.validation_error");
            return json_error(StatusCode::BAD_REQUEST, ApiError::validation(&err));
        }
    };

    let result = measure(&state.metrics, "api.stats", || {
        fetch(&state, &claims.sub, &query)
    })
    .await;

    match result {
        Ok(data) => {
            state.metrics.increment("api.stats.success");
            let mut metadata = json!({
                "timestamp": now_rfc3339(),
                "userId": claims.sub,
            });
            if query.stats_type == StatsType::Daily {
                metadata["days"] = json!(query.days);
            }
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "type": query.stats_type.as_str(),
                    "data": data,
                    "metadata": metadata,
                })),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.increment("api.stats.error");
            logger.error("Failed to fetch analytics data", &e);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal(
                    "Failed to fetch analytics data",
                    "FETCH_ERROR",
                    state.config.dev_mode,
                    Some(e.to_string()),
                ),
            )
        }
    }
}

async fn fetch(state: &AppState, user_id: &str, query: &StatsQuery) -> StoreResult<Value> {
    let stats = &state.stats;
    match query.stats_type {
        StatsType::Activity if query.wants_pagination() => to_json(
            stats
                .activity_stats_paginated(
                    Some(user_id),
                    query.page,
                    query.limit,
                    query.cursor.as_deref(),
                )
                .await,
        ),
        StatsType::Activity => to_json(stats.activity_stats(user_id).await),
        StatsType::Pageviews if query.wants_pagination() => to_json(
            stats
                .page_view_stats_paginated(
                    Some(user_id),
                    query.page,
                    query.limit,
                    query.cursor.as_deref(),
                )
                .await,
        ),
        StatsType::Pageviews => to_json(stats.page_view_stats(Some(user_id)).await),
        StatsType::Daily => to_json(stats.daily_activity(Some(user_id), query.days).await),
        StatsType::Performance => to_json(stats.api_performance(Some(user_id)).await),
    }
}

fn to_json<T: Serialize>(result: StoreResult<T>) -> StoreResult<Value> {
    result.and_then(|value| serde_json::to_value(value).map_err(StoreError::from))
}
