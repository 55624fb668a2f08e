//! Utility functions and helpers

pub mod time;

pub use time::{current_timestamp, day_label, day_of, now_rfc3339};
