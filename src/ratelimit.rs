//! Per-client fixed-window request counter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_LIMIT: u32 = 3;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one [`RateLimiter::check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

#[derive(Clone, Copy, Debug)]
struct RateLimitRecord {
    count: u32,
    reset_at: Instant,
}

/// Counts requests per identity; each identity gets `limit` requests per `window`.
///
/// Records are never evicted, so memory grows with the number of distinct identities seen
/// over the life of the process.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request from `identity` now.
    pub fn check(&self, identity: &str) -> RateDecision {
        self.check_at(identity, Instant::now())
    }

    /// Count one request from `identity` at `now`. The whole read-modify-write happens under
    /// one lock, so concurrent callers can never push an identity past the limit.
    pub fn check_at(&self, identity: &str, now: Instant) -> RateDecision {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let decision = match records.get_mut(identity) {
            Some(record) if now <= record.reset_at => {
                if record.count >= self.limit {
                    RateDecision {
                        allowed: false,
                        remaining: 0,
                    }
                } else {
                    record.count += 1;
                    RateDecision {
                        allowed: true,
                        remaining: self.limit - record.count,
                    }
                }
            }
            _ => {
                if self.limit == 0 {
                    return RateDecision {
                        allowed: false,
                        remaining: 0,
                    };
                }
                records.insert(
                    identity.to_string(),
                    RateLimitRecord {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                RateDecision {
                    allowed: true,
                    remaining: self.limit - 1,
                }
            }
        };

        if !decision.allowed {
            tracing::info!(identity, "rate limit exceeded");
        }
        decision
    }

    /// Number of identities with a record.
    pub fn tracked_identities(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
