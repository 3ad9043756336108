//! Per-client admission control

use dashmap::DashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outcome of an admission check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Admission check keyed by a stable per-caller identifier
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, client_id: &str) -> RateDecision;
}

#[derive(Clone, Copy, Debug)]
struct WindowSlot {
    window_start: u64,
    count: u32,
}

/// Fixed-window counter over a concurrent map.
///
/// Increment-and-check happens under the per-key entry guard, so
/// concurrent requests from one client cannot both consume the last
/// admission slot.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    slots: DashMap<String, WindowSlot>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            slots: DashMap::new(),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    // Clock-injected for tests
    fn check_at(&self, client_id: &str, now: u64) -> RateDecision {
        let window_secs = self.window.as_secs().max(1);

        let mut slot = self
            .slots
            .entry(client_id.to_string())
            .or_insert(WindowSlot {
                window_start: now,
                count: 0,
            });

        if now.saturating_sub(slot.window_start) >= window_secs {
            slot.window_start = now;
            slot.count = 0;
        }

        if slot.count < self.max_requests {
            slot.count += 1;
            RateDecision {
                allowed: true,
                remaining: self.max_requests - slot.count,
            }
        } else {
            RateDecision {
                allowed: false,
                remaining: 0,
            }
        }
    }

    /// Drop entries whose window has fully elapsed
    pub fn prune(&self) {
        let now = Self::now_secs();
        let window_secs = self.window.as_secs().max(1);
        self.slots
            .retain(|_, slot| now.saturating_sub(slot.window_start) < window_secs);
    }

    pub fn tracked_clients(&self) -> usize {
        self.slots.len()
    }
}

#[async_trait::async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, client_id: &str) -> RateDecision {
        self.check_at(client_id, Self::now_secs())
    }
}
