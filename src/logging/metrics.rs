//! Simple in-memory metrics
//!
//! Counters and gauges for local visibility. Not exported anywhere yet;
//! `snapshot` serves them to whatever wants a look.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::{json, Value};

/// In-memory counter/gauge registry
#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    pub fn increment_by(&self, name: &str, value: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += value;
    }

    /// Set a gauge to an absolute value
    pub fn gauge(&self, name: &str, value: f64) {
        self.gauges.lock().insert(name.to_string(), value);
    }

    /// Record an operation duration: gauge for the latest value plus a
    /// companion call counter
    pub fn timing(&self, name: &str, duration_ms: u64) {
        self.gauge(&format!("{}_duration", name), duration_ms as f64);
        self.increment(&format!("{}_count", name));
    }

    /// Current counter value, zero if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// All counters and gauges as JSON
    pub fn snapshot(&self) -> Value {
        json!({
            "counters": self.counters.lock().clone(),
            "gauges": self.gauges.lock().clone(),
        })
    }
}

/// Run an async operation and record its duration under `name`
pub async fn measure<T, F, Fut>(metrics: &Metrics, name: &str, op: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    let result = op().await;
    metrics.timing(name, start.elapsed().as_millis() as u64);
    result
}
