//! # Rate Limiting (HG-03)
//!
//! Per-key sliding-window admission control.
//!
//! ## Algorithm
//!
//! Each key keeps the timestamps of its accepted events. On every
//! [`RateLimiter::allow`] call for a key, timestamps at or before
//! `now - window` are pruned; if `limit` or more remain the event is
//! rejected (and not recorded), otherwise it is accepted and `now` is
//! appended. This is an exact sliding window, not a fixed-bucket
//! approximation.
//!
//! All keys share one mutex, so concurrent `allow` calls on the same key
//! are strictly serialized.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sliding-window limiter keyed by an opaque string (usually `source:id`).
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// A zero `limit` is coerced to 1 and a zero `window` to one second.
    pub fn new(limit: usize, window: Duration) -> Self {
        let limit = limit.max(1);
        let window = if window.is_zero() {
            Duration::from_secs(1)
        } else {
            window
        };
        Self {
            limit,
            window,
            events: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject one event for `key` at `now`.
    pub fn allow(&self, key: &str, now: Instant) -> bool {
        let mut events = self.events.lock();
        let entries = events.entry(key.to_string()).or_default();

        while let Some(&oldest) = entries.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= self.limit {
            debug!(key, limit = self.limit, "Rate limit exceeded");
            return false;
        }
        entries.push_back(now);
        true
    }

    /// [`allow`](Self::allow) at the current instant.
    pub fn check(&self, key: &str) -> bool {
        self.allow(key, Instant::now())
    }

    /// Drop keys whose events have all left the window.
    pub fn purge_idle(&self, now: Instant) {
        let window = self.window;
        self.events.lock().retain(|key, entries| {
            let active = entries
                .back()
                .is_some_and(|&last| now.saturating_duration_since(last) < window);
            if !active {
                debug!(key = %key, "Removing idle rate limit key");
            }
            active
        });
    }

    /// Number of keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.events.lock().len()
    }
}

/// Periodically purge idle keys. Runs until the task is aborted.
pub async fn cleanup_task(limiter: Arc<RateLimiter>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        limiter.purge_idle(Instant::now());
    }
}
