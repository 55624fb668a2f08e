//! Structured logging and in-memory metrics
//!
//! Logs go to stderr: human-readable lines in development, one JSON object
//! per line in production. Loggers are cheap to clone and carry a context
//! map (endpoint, ip, user id) that every line inherits.

pub mod metrics;

pub use metrics::Metrics;

use std::collections::BTreeMap;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

use serde_json::{json, Value};

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A logger with attached context fields
#[derive(Debug, Clone)]
pub struct Logger {
    context: BTreeMap<String, Value>,
    dev_mode: bool,
}

impl Logger {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            context: BTreeMap::new(),
            dev_mode,
        }
    }

    /// Derive a logger that carries an extra context field
    pub fn with_field(&self, key: &str, value: impl Into<Value>) -> Self {
        let mut child = self.clone();
        child.context.insert(key.to_string(), value.into());
        child
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn error(&self, message: &str, err: &dyn std::fmt::Display) {
        self.log(LogLevel::Error, message, Some(json!(err.to_string())));
    }

    fn log(&self, level: LogLevel, message: &str, error: Option<Value>) {
        let timestamp = crate::utils::now_rfc3339();

        if self.dev_mode {
            let mut ctx = self.context.clone();
            if let Some(e) = error {
                ctx.insert("error".to_string(), e);
            }
            let ctx_str = if ctx.is_empty() {
                String::new()
            } else {
                format!(" {}", json!(ctx))
            };
            eprintln!("[{}] {} - {}{}", level.as_str(), timestamp, message, ctx_str);
        } else {
            let mut line = json!({
                "timestamp": timestamp,
                "level": level.as_str(),
                "message": message,
                "context": self.context,
            });
            if let Some(e) = error {
                line["error"] = e;
            }
            eprintln!("{}", line);
        }
    }
}

/// Logger preloaded with per-request context for an API endpoint
pub fn api_logger(dev_mode: bool, endpoint: &str, ip: &str) -> Logger {
    Logger::new(dev_mode)
        .with_field("endpoint", endpoint)
        .with_field("ip", ip)
        .with_field("requestId", generate_request_id())
}

/// Short unique-enough id for correlating log lines of one request
fn generate_request_id() -> String {
    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_i64(chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));
    hasher.write_u32(std::process::id());
    format!("{:012x}", hasher.finish() & 0xffff_ffff_ffff)
}
