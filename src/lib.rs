//! Pulse Analytics
//!
//! Self-hosted analytics ingestion and caching core for a subscription
//! dashboard: validated event tracking, per-IP rate limiting, a TTL cache
//! in front of the aggregate queries, and an append-only event store.
//!
//! # Modules
//!
//! - `types`: event, user and stats data structures
//! - `config`: environment-driven server configuration
//! - `logging`: structured stderr logging and in-memory metrics
//! - `validation`: payload schemas and free-text sanitizers
//! - `rate_limit`: fixed-window per-IP limiter with penalty blocks
//! - `cache`: TTL cache with per-user invalidation
//! - `store`: store of record with JSONL persistence
//! - `analytics`: the event writer and cached stats reader
//! - `api`: axum handlers, JWT auth, router assembly
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulse_analytics::api::http::create_router;
//! use pulse_analytics::api::state::AppState;
//! use pulse_analytics::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = Arc::new(AppState::new(AppConfig::from_env()).unwrap());
//!     let app = create_router(state);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3040").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod logging;
pub mod rate_limit;
pub mod store;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items at crate root
pub use analytics::{EventWriter, StatsReader};
pub use cache::CacheStore;
pub use config::AppConfig;
pub use rate_limit::{LimiterClass, RateLimiter};
pub use store::{RecordStore, StoreConfig, StoreError, StoreResult};
pub use types::{ActivityEvent, ApiUsageEvent, HttpMethod, PageViewEvent, User};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
