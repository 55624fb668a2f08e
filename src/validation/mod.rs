//! Payload validation and sanitization
//!
//! Schema checks for all inbound analytics payloads plus the uniform
//! free-text sanitizers. Failures enumerate every violated field, not
//! just the first.

mod sanitize;
mod schemas;

pub use sanitize::{
    is_valid_action, sanitize_ip, sanitize_page, sanitize_string, sanitize_user_agent,
};
pub use schemas::{
    validate_activity, validate_api_usage, validate_batch, validate_page_view,
    validate_stats_query, ActivityInput, ActivityRecord, ApiUsageInput, BatchInput, FieldIssue,
    PageViewInput, PageViewRecord, StatsQuery, StatsType, ValidationError, MAX_BATCH_ACTIVITIES,
    MAX_BATCH_PAGE_VIEWS, MAX_METADATA_BYTES,
};
