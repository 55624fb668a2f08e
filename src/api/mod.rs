//! HTTP API module
//!
//! Request handlers orchestrate: rate-limit check, identity check,
//! validation, writer/reader invocation, response shaping. Error bodies
//! are uniform `{error, code, message?, details?}`; internal details only
//! appear in development builds.

pub mod auth;
pub mod http;
pub mod rest;
pub mod state;
pub mod usage;

use serde::Serialize;
use serde_json::Value;

use crate::validation::ValidationError;

/// Uniform API error body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn auth_required(message: Option<&str>) -> Self {
        Self {
            error: "Unauthorized".to_string(),
            code: "AUTH_REQUIRED".to_string(),
            message: message.map(str::to_string),
            details: None,
        }
    }

    pub fn validation(err: &ValidationError) -> Self {
        Self {
            error: "Validation failed".to_string(),
            code: "VALIDATION_ERROR".to_string(),
            message: None,
            details: Some(err.details()),
        }
    }

    pub fn invalid_json() -> Self {
        Self {
            error: "Invalid JSON in request body".to_string(),
            code: "INVALID_JSON".to_string(),
            message: None,
            details: None,
        }
    }

    /// Generic 500 body. `detail` is only attached in development builds;
    /// production callers never see raw error messages.
    pub fn internal(error: &str, code: &str, dev_mode: bool, detail: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
            message: None,
            details: if dev_mode {
                detail.map(Value::String)
            } else {
                None
            },
        }
    }
}
