//! Fixed-window request throttling per client.
//!
//! Advisory only: the limiter protects the public endpoints from bursts and
//! has no say in gating. Windows that have ended are purged on every check
//! so spoofed client ids cannot grow the map without bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Whole seconds until the window resets, at least 1.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let secs = (self.reset_at - now).num_seconds().max(1);
        u64::try_from(secs).unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            window,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Count one request from `client` and say whether it may proceed.
    pub fn check(&self, client: &str) -> RateDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, window| now <= window.reset_at);

        match windows.get_mut(client) {
            None => {
                let reset_at = now + self.window;
                windows.insert(client.to_string(), Window { count: 1, reset_at });
                RateDecision {
                    allowed: true,
                    remaining: self.limit.saturating_sub(1),
                    reset_at,
                }
            }
            Some(window) if window.count >= self.limit => {
                tracing::warn!(client, limit = self.limit, "rate limit exceeded");
                RateDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: window.reset_at,
                }
            }
            Some(window) => {
                window.count += 1;
                RateDecision {
                    allowed: true,
                    remaining: self.limit - window.count,
                    reset_at: window.reset_at,
                }
            }
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
