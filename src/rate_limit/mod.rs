//! Per-IP, per-endpoint-class rate limiting
//!
//! Fixed-window counters with a penalty block: exhausting a window's
//! budget puts the key into a blocked state for the class's block
//! duration, and the block is honored even across window rollovers.
//!
//! The fixed window allows a burst of up to 2x budget across a window
//! boundary. Known and kept: the block duration is the actual backstop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Interval of the background state sweep: 10 minutes
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Endpoint classes with independent budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterClass {
    PageView,
    Activity,
    GenericApi,
}

impl LimiterClass {
    /// Points available per window
    pub fn points(&self) -> u32 {
        match self {
            LimiterClass::PageView => 100,
            LimiterClass::Activity => 50,
            LimiterClass::GenericApi => 200,
        }
    }

    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// How long an exhausted key stays blocked
    pub fn block_duration(&self) -> Duration {
        match self {
            LimiterClass::PageView => Duration::from_secs(60),
            LimiterClass::Activity => Duration::from_secs(300),
            LimiterClass::GenericApi => Duration::from_secs(60),
        }
    }

}

/// Consumption state for one (client key, class) pair
#[derive(Debug, Clone)]
struct RateLimitState {
    points_consumed: u32,
    window_start: Instant,
    blocked_until: Option<Instant>,
}

/// Details of a rejected call, enough to build backoff headers
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitExceeded {
    /// Budget of the limiter class
    pub limit: u32,
    /// Points left in the current window (zero once blocked)
    pub remaining: u32,
    /// Whole seconds until the caller may retry, rounded up
    pub retry_after_secs: u64,
    /// Wall-clock time the block lifts
    pub reset: DateTime<Utc>,
}

impl std::fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rate limit exceeded, retry after {}s", self.retry_after_secs)
    }
}

/// Fixed-window rate limiter shared across request handlers
#[derive(Debug, Default)]
pub struct RateLimiter {
    states: Mutex<HashMap<(String, LimiterClass), RateLimitState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one point for `key` under `class`
    ///
    /// `Err` carries the remaining block time rounded up to whole seconds.
    pub fn check(&self, key: &str, class: LimiterClass) -> Result<(), RateLimitExceeded> {
        self.check_at(key, class, Instant::now())
    }

    fn check_at(
        &self,
        key: &str,
        class: LimiterClass,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let mut states = self.states.lock();
        let state = states
            .entry((key.to_string(), class))
            .or_insert_with(|| RateLimitState {
                points_consumed: 0,
                window_start: now,
                blocked_until: None,
            });

        // An active block rejects regardless of window rollover
        if let Some(blocked_until) = state.blocked_until {
            if now < blocked_until {
                return Err(Self::rejection(class, 0, blocked_until - now));
            }
            // Block elapsed: clear it and start a fresh window
            state.blocked_until = None;
            state.points_consumed = 0;
            state.window_start = now;
        }

        if now.duration_since(state.window_start) >= class.window() {
            state.points_consumed = 0;
            state.window_start = now;
        }

        state.points_consumed += 1;
        if state.points_consumed > class.points() {
            let blocked_until = now + class.block_duration();
            state.blocked_until = Some(blocked_until);
            return Err(Self::rejection(class, 0, class.block_duration()));
        }

        Ok(())
    }

    /// Number of (client key, class) pairs currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.states.lock().len()
    }

    /// Drop state for keys that can no longer influence a decision: the
    /// window has lapsed and any block has expired. Spoofable client keys
    /// would otherwise grow the map without bound.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    fn cleanup_at(&self, now: Instant) -> usize {
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|(_, class), state| {
            if let Some(blocked_until) = state.blocked_until {
                if now < blocked_until {
                    return true;
                }
            }
            now.duration_since(state.window_start) < class.window()
        });
        before - states.len()
    }

    /// Spawn the periodic sweep task for a shared limiter
    pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                let removed = limiter.cleanup();
                if removed > 0 {
                    eprintln!("[RateLimit] Sweep removed {} idle client entries", removed);
                }
            }
        })
    }

    fn rejection(class: LimiterClass, remaining: u32, wait: Duration) -> RateLimitExceeded {
        let retry_after_secs = wait.as_secs() + if wait.subsec_nanos() > 0 { 1 } else { 0 };
        RateLimitExceeded {
            limit: class.points(),
            remaining,
            retry_after_secs,
            reset: Utc::now()
                + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::seconds(60)),
        }
    }
}

/// Derive the rate-limit key for a request
///
/// First IP of `x-forwarded-for`, else `x-real-ip`, else the literal
/// `"unknown"`. All unattributable clients therefore share one budget.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}
