//! Payload schemas for inbound analytics requests
//!
//! Each validator checks every field and reports all violations at once,
//! not just the first, so clients can fix a payload in one round trip.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::sanitize::{is_valid_action, sanitize_ip, sanitize_page, sanitize_user_agent};

/// Maximum serialized metadata size in bytes. Oversized metadata is a hard
/// validation failure, not a truncation.
pub const MAX_METADATA_BYTES: usize = 5000;

/// Batch size bounds per event type
pub const MAX_BATCH_PAGE_VIEWS: usize = 100;
pub const MAX_BATCH_ACTIVITIES: usize = 50;

/// One violated field constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Validation failure listing every violated constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    fn new() -> Self {
        Self { issues: Vec::new() }
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Issues as a JSON array for the `details` field of error responses
    pub fn details(&self) -> Value {
        serde_json::to_value(&self.issues).unwrap_or(Value::Null)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed with {} issue(s)", self.issues.len())
    }
}

impl std::error::Error for ValidationError {}

/// Sanitized page-view payload
#[derive(Debug, Clone, PartialEq)]
pub struct PageViewInput {
    pub page: String,
    pub user_agent: Option<String>,
}

/// Sanitized activity payload
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityInput {
    pub action: String,
    pub metadata: Option<Value>,
}

/// One page view in a batch request
#[derive(Debug, Clone, PartialEq)]
pub struct PageViewRecord {
    pub page: String,
    pub user_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// One activity in a batch request
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub user_id: String,
    pub action: String,
    pub metadata: Option<Value>,
}

/// A validated batch payload, single-typed by construction
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInput {
    PageViews(Vec<PageViewRecord>),
    Activities(Vec<ActivityRecord>),
}

impl BatchInput {
    pub fn type_name(&self) -> &'static str {
        match self {
            BatchInput::PageViews(_) => "pageviews",
            BatchInput::Activities(_) => "activities",
        }
    }
}

/// Sanitized API usage payload
#[derive(Debug, Clone, PartialEq)]
pub struct ApiUsageInput {
    pub endpoint: String,
    pub method: crate::types::HttpMethod,
    pub status: u16,
    pub duration_ms: u32,
}

/// Which aggregate a stats query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsType {
    Activity,
    Pageviews,
    Daily,
    Performance,
}

impl StatsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsType::Activity => "activity",
            StatsType::Pageviews => "pageviews",
            StatsType::Daily => "daily",
            StatsType::Performance => "performance",
        }
    }
}

/// Validated stats query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StatsQuery {
    pub stats_type: StatsType,
    pub days: u32,
    pub page: u64,
    pub limit: u64,
    pub cursor: Option<String>,
}

impl StatsQuery {
    /// Pagination kicks in when any non-default paging parameter is set
    pub fn wants_pagination(&self) -> bool {
        self.page > 1 || self.limit != 50 || self.cursor.is_some()
    }
}

fn get_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

fn check_metadata(
    payload: &Value,
    field: &str,
    errors: &mut ValidationError,
) -> Option<Value> {
    let metadata = payload.get("metadata")?;
    if metadata.is_null() {
        return None;
    }
    if !metadata.is_object() {
        errors.push(field, "Metadata must be an object");
        return None;
    }
    let serialized_len = metadata.to_string().len();
    if serialized_len > MAX_METADATA_BYTES {
        errors.push(field, "Metadata too large");
        return None;
    }
    Some(metadata.clone())
}

/// Validate a `POST /analytics/page-view` body
pub fn validate_page_view(payload: &Value) -> Result<PageViewInput, ValidationError> {
    let mut errors = ValidationError::new();

    let page = match get_str(payload, "page") {
        Some(p) if p.is_empty() => {
            errors.push("page", "Page is required");
            String::new()
        }
        Some(p) => {
            if p.len() > 500 {
                errors.push("page", "Page path too long");
            }
            if !p.starts_with('/') {
                errors.push("page", "Page must start with /");
            }
            if p.to_ascii_lowercase().contains("<script") {
                errors.push("page", "Invalid characters detected");
            }
            sanitize_page(p)
        }
        None => {
            errors.push("page", "Page is required");
            String::new()
        }
    };

    let user_agent = match get_str(payload, "userAgent") {
        Some(ua) => {
            if ua.len() > 1000 {
                errors.push("userAgent", "User agent too long");
            }
            Some(sanitize_user_agent(ua))
        }
        None => None,
    };

    errors.into_result(PageViewInput { page, user_agent })
}

/// Validate a `POST /analytics/activity` body
pub fn validate_activity(payload: &Value) -> Result<ActivityInput, ValidationError> {
    let mut errors = ValidationError::new();

    let action = match get_str(payload, "action") {
        Some(a) if a.is_empty() => {
            errors.push("action", "Action is required");
            String::new()
        }
        Some(a) => {
            if a.len() > 100 {
                errors.push("action", "Action name too long");
            }
            if !is_valid_action(a) {
                errors.push("action", "Action contains invalid characters");
            }
            a.to_string()
        }
        None => {
            errors.push("action", "Action is required");
            String::new()
        }
    };

    let metadata = check_metadata(payload, "metadata", &mut errors);

    errors.into_result(ActivityInput { action, metadata })
}

/// Validate a `POST /analytics/batch` body
pub fn validate_batch(payload: &Value) -> Result<BatchInput, ValidationError> {
    let mut errors = ValidationError::new();

    let batch_type = match get_str(payload, "type") {
        Some("pageviews") => Some("pageviews"),
        Some("activities") => Some("activities"),
        Some(_) => {
            errors.push("type", "Type must be 'pageviews' or 'activities'");
            None
        }
        None => {
            errors.push("type", "Type is required");
            None
        }
    };

    let data = match payload.get("data").and_then(Value::as_array) {
        Some(items) => items,
        None => {
            errors.push("data", "Data must be an array");
            return Err(errors);
        }
    };

    match batch_type {
        Some("pageviews") => {
            if data.is_empty() {
                errors.push("data", "At least one page view required");
            }
            if data.len() > MAX_BATCH_PAGE_VIEWS {
                errors.push(
                    "data",
                    format!("Maximum {} page views per batch request", MAX_BATCH_PAGE_VIEWS),
                );
            }
            let mut records = Vec::with_capacity(data.len());
            for (i, item) in data.iter().enumerate() {
                records.push(validate_batch_page_view(item, i, &mut errors));
            }
            errors.into_result(BatchInput::PageViews(records))
        }
        Some("activities") => {
            if data.is_empty() {
                errors.push("data", "At least one activity required");
            }
            if data.len() > MAX_BATCH_ACTIVITIES {
                errors.push(
                    "data",
                    format!("Maximum {} activities per batch request", MAX_BATCH_ACTIVITIES),
                );
            }
            let mut records = Vec::with_capacity(data.len());
            for (i, item) in data.iter().enumerate() {
                records.push(validate_batch_activity(item, i, &mut errors));
            }
            errors.into_result(BatchInput::Activities(records))
        }
        _ => Err(errors),
    }
}

fn validate_batch_page_view(
    item: &Value,
    index: usize,
    errors: &mut ValidationError,
) -> PageViewRecord {
    let field = |name: &str| format!("data[{}].{}", index, name);

    let page = match get_str(item, "page") {
        Some(p) if !p.is_empty() => {
            if p.len() > 500 {
                errors.push(&field("page"), "Page path too long");
            }
            sanitize_page(p)
        }
        _ => {
            errors.push(&field("page"), "Page path is required");
            String::new()
        }
    };

    let user_agent = get_str(item, "userAgent").map(|ua| {
        if ua.len() > 1000 {
            errors.push(&field("userAgent"), "User agent too long");
        }
        sanitize_user_agent(ua)
    });

    PageViewRecord {
        page,
        user_id: get_str(item, "userId").map(str::to_string),
        user_agent,
        ip: get_str(item, "ip").map(sanitize_ip),
    }
}

fn validate_batch_activity(
    item: &Value,
    index: usize,
    errors: &mut ValidationError,
) -> ActivityRecord {
    let field = |name: &str| format!("data[{}].{}", index, name);

    let user_id = match get_str(item, "userId") {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            errors.push(&field("userId"), "User ID is required");
            String::new()
        }
    };

    let action = match get_str(item, "action") {
        Some(a) if !a.is_empty() => {
            if a.len() > 100 {
                errors.push(&field("action"), "Action name too long");
            }
            if !is_valid_action(a) {
                errors.push(&field("action"), "Action contains invalid characters");
            }
            a.to_string()
        }
        _ => {
            errors.push(&field("action"), "Action is required");
            String::new()
        }
    };

    let mut metadata_errors = ValidationError::new();
    let metadata = check_metadata(item, &field("metadata"), &mut metadata_errors);
    errors.issues.extend(metadata_errors.issues);

    ActivityRecord {
        user_id,
        action,
        metadata,
    }
}

/// Validate an internally-produced API usage record
pub fn validate_api_usage(payload: &Value) -> Result<ApiUsageInput, ValidationError> {
    let mut errors = ValidationError::new();

    let endpoint = match get_str(payload, "endpoint") {
        Some(e) if !e.is_empty() => {
            if e.len() > 200 {
                errors.push("endpoint", "Endpoint too long");
            }
            e.to_string()
        }
        _ => {
            errors.push("endpoint", "Endpoint is required");
            String::new()
        }
    };

    let method = match get_str(payload, "method").and_then(crate::types::HttpMethod::parse) {
        Some(m) => m,
        None => {
            errors.push("method", "Method must be one of GET, POST, PUT, DELETE, PATCH");
            crate::types::HttpMethod::GET
        }
    };

    let status = match payload.get("status").and_then(Value::as_u64) {
        Some(s) if (100..=599).contains(&s) => s as u16,
        _ => {
            errors.push("status", "Status must be between 100 and 599");
            0
        }
    };

    let duration_ms = match payload.get("duration").and_then(Value::as_u64) {
        Some(d) if d <= 60_000 => d as u32,
        _ => {
            errors.push("duration", "Duration must be between 0 and 60000");
            0
        }
    };

    errors.into_result(ApiUsageInput {
        endpoint,
        method,
        status,
        duration_ms,
    })
}

/// Validate `GET /analytics/stats` query parameters
pub fn validate_stats_query(
    params: &HashMap<String, String>,
) -> Result<StatsQuery, ValidationError> {
    let mut errors = ValidationError::new();

    let stats_type = match params.get("type").map(String::as_str) {
        Some("activity") => StatsType::Activity,
        Some("pageviews") => StatsType::Pageviews,
        Some("daily") => StatsType::Daily,
        Some("performance") => StatsType::Performance,
        Some(_) => {
            errors.push(
                "type",
                "Type must be one of activity, pageviews, daily, performance",
            );
            StatsType::Activity
        }
        None => {
            errors.push("type", "Analytics type is required");
            StatsType::Activity
        }
    };

    let days = match params.get("days") {
        Some(raw) => match raw.parse::<u32>() {
            Ok(d) if (1..=365).contains(&d) => d,
            _ => {
                errors.push("days", "Days must be between 1 and 365");
                7
            }
        },
        None => 7,
    };

    let page = match params.get("page") {
        Some(raw) => match raw.parse::<u64>() {
            Ok(p) if p >= 1 => p,
            _ => {
                errors.push("page", "Page must be 1 or greater");
                1
            }
        },
        None => 1,
    };

    let limit = match params.get("limit") {
        Some(raw) => match raw.parse::<u64>() {
            Ok(l) if (1..=100).contains(&l) => l,
            _ => {
                errors.push("limit", "Limit must be between 1 and 100");
                50
            }
        },
        None => 50,
    };

    let cursor = params.get("cursor").filter(|c| !c.is_empty()).cloned();

    errors.into_result(StatsQuery {
        stats_type,
        days,
        page,
        limit,
        cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_view_valid() {
        let input = validate_page_view(&json!({
            "page": "/dashboard",
            "userAgent": "Mozilla/5.0"
        }))
        .unwrap();

        assert_eq!(input.page, "/dashboard");
        assert_eq!(input.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_page_view_must_start_with_slash() {
        let err = validate_page_view(&json!({"page": "dashboard"})).unwrap_err();
        assert!(err
            .issues
            .iter()
            .any(|i| i.field == "page" && i.message.contains("start with /")));
    }

    #[test]
    fn test_page_view_collects_all_issues() {
        let long_page = format!("x{}", "a".repeat(600));
        let err = validate_page_view(&json!({
            "page": long_page,
            "userAgent": "u".repeat(1500),
        }))
        .unwrap_err();

        // Both the page problems and the user-agent problem are reported
        assert!(err.issues.iter().any(|i| i.field == "page"));
        assert!(err.issues.iter().any(|i| i.field == "userAgent"));
        assert!(err.issues.len() >= 3);
    }

    #[test]
    fn test_activity_valid() {
        let input = validate_activity(&json!({
            "action": "data_export",
            "metadata": {"format": "csv"}
        }))
        .unwrap();

        assert_eq!(input.action, "data_export");
        assert_eq!(input.metadata, Some(json!({"format": "csv"})));
    }

    #[test]
    fn test_activity_rejects_space_in_action() {
        let err = validate_activity(&json!({"action": "data export"})).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "action"));
    }

    #[test]
    fn test_activity_rejects_oversized_metadata() {
        // ~6KB serialized regardless of field count
        let big = "x".repeat(6000);
        let err = validate_activity(&json!({
            "action": "upload",
            "metadata": {"blob": big}
        }))
        .unwrap_err();

        assert!(err
            .issues
            .iter()
            .any(|i| i.field == "metadata" && i.message == "Metadata too large"));
    }

    #[test]
    fn test_batch_rejects_empty_and_oversized() {
        let err = validate_batch(&json!({"type": "activities", "data": []})).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "data"));

        let too_many: Vec<Value> = (0..51)
            .map(|i| json!({"userId": "u1", "action": format!("a{}", i)}))
            .collect();
        let err = validate_batch(&json!({"type": "activities", "data": too_many})).unwrap_err();
        assert!(err
            .issues
            .iter()
            .any(|i| i.message.contains("Maximum 50 activities")));
    }

    #[test]
    fn test_batch_page_views_sanitizes_ip() {
        let batch = validate_batch(&json!({
            "type": "pageviews",
            "data": [
                {"page": "/a", "ip": "10.0.0.1"},
                {"page": "/b", "ip": "garbage"},
            ]
        }))
        .unwrap();

        match batch {
            BatchInput::PageViews(records) => {
                assert_eq!(records[0].ip.as_deref(), Some("10.0.0.1"));
                assert_eq!(records[1].ip.as_deref(), Some("unknown"));
            }
            _ => panic!("expected page views"),
        }
    }

    #[test]
    fn test_batch_reports_issue_per_item() {
        let err = validate_batch(&json!({
            "type": "activities",
            "data": [
                {"userId": "u1", "action": "ok_action"},
                {"userId": "", "action": "bad action"},
            ]
        }))
        .unwrap_err();

        assert!(err.issues.iter().any(|i| i.field == "data[1].userId"));
        assert!(err.issues.iter().any(|i| i.field == "data[1].action"));
    }

    #[test]
    fn test_api_usage_bounds() {
        let err = validate_api_usage(&json!({
            "endpoint": "/analytics/stats",
            "method": "GET",
            "status": 700,
            "duration": 99999,
        }))
        .unwrap_err();

        assert!(err.issues.iter().any(|i| i.field == "status"));
        assert!(err.issues.iter().any(|i| i.field == "duration"));
    }

    #[test]
    fn test_stats_query_defaults() {
        let mut params = HashMap::new();
        params.insert("type".to_string(), "daily".to_string());

        let query = validate_stats_query(&params).unwrap();
        assert_eq!(query.stats_type, StatsType::Daily);
        assert_eq!(query.days, 7);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 50);
        assert!(!query.wants_pagination());
    }

    #[test]
    fn test_stats_query_requires_type_and_bounds() {
        let mut params = HashMap::new();
        params.insert("days".to_string(), "400".to_string());
        params.insert("limit".to_string(), "500".to_string());

        let err = validate_stats_query(&params).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "type"));
        assert!(err.issues.iter().any(|i| i.field == "days"));
        assert!(err.issues.iter().any(|i| i.field == "limit"));
    }

    #[test]
    fn test_stats_query_cursor_triggers_pagination() {
        let mut params = HashMap::new();
        params.insert("type".to_string(), "activity".to_string());
        params.insert("cursor".to_string(), "42".to_string());

        let query = validate_stats_query(&params).unwrap();
        assert_eq!(query.cursor.as_deref(), Some("42"));
        assert!(query.wants_pagination());
    }
}
