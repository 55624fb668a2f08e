//! Response shapes for the stats endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single name/value data point for breakdown charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatPoint {
    pub name: String,
    pub value: u64,
}

/// Per-endpoint API performance aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStat {
    pub endpoint: String,
    /// Average duration in milliseconds, rounded
    pub avg_duration: u64,
    pub count: u64,
}

/// Activity row returned by paginated listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityListItem {
    pub id: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Page-view row returned by paginated listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewListItem {
    pub id: String,
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A page of listing results plus its pagination envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

/// Pagination metadata for either mode
///
/// Offset mode carries page/total bookkeeping; cursor mode carries the
/// opaque continuation marker. The two are mutually exclusive: cursor mode
/// is selected whenever the caller supplied a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageInfo {
    #[serde(rename_all = "camelCase")]
    Offset {
        page: u64,
        limit: u64,
        total: u64,
        total_pages: u64,
        has_next: bool,
        has_prev: bool,
    },
    #[serde(rename_all = "camelCase")]
    Cursor {
        next_cursor: Option<String>,
        has_more: bool,
    },
}
