//! Analytics event records persisted to the store of record
//!
//! Events are immutable once written: the core never updates or deletes
//! them, only appends and aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user action recorded from the dashboard (button clicks, exports, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: u64,
    pub user_id: String,
    /// Validated action token, confined to `[A-Za-z0-9_-]`
    pub action: String,
    /// Optional JSON blob, bounded to 5000 serialized bytes at validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A single page view, attributable to a user or anonymous
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewEvent {
    pub id: u64,
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Strictly IPv4/IPv6 shaped, or the sentinel `"unknown"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One API call, recorded for performance breakdowns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsageEvent {
    pub id: u64,
    pub user_id: String,
    pub endpoint: String,
    pub method: HttpMethod,
    /// HTTP status code, 100..=599
    pub status: u16,
    /// Request duration in milliseconds, capped at 60_000
    pub duration_ms: u32,
    pub created_at: DateTime<Utc>,
}

/// HTTP methods accepted for API usage tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl HttpMethod {
    /// Parse from an uppercase method string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_parse() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::parse("PATCH"), Some(HttpMethod::PATCH));
        assert_eq!(HttpMethod::parse("get"), None);
        assert_eq!(HttpMethod::parse("HEAD"), None);
    }

    #[test]
    fn test_activity_event_serializes_camel_case() {
        let event = ActivityEvent {
            id: 7,
            user_id: "u1".to_string(),
            action: "login".to_string(),
            metadata: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["userId"], "u1");
        assert!(json.get("metadata").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
