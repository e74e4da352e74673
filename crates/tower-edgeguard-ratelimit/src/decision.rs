//! The value object produced by every rate-limit check.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Which limiter produced a decision; stamped into the
/// `X-RateLimit-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterType {
    Ip,
    User,
}

impl LimiterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterType::Ip => "ip",
            LimiterType::User => "user",
        }
    }
}

/// Outcome of one sliding-window check.
///
/// Invariants: `remaining <= limit`; `!allowed` implies `remaining == 0`
/// and a positive `retry_after`. The window that produced the decision
/// rides along so concurrent checks with different windows never share
/// mutable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub key: String,
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    pub reset_at: SystemTime,
    pub retry_after: Duration,
    pub window: Duration,
    pub limiter: LimiterType,
}

impl RateLimitDecision {
    /// The reset instant as UNIX seconds, for the `X-RateLimit-Reset`
    /// header.
    pub fn reset_unix_secs(&self) -> u64 {
        self.reset_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// `retry_after` rounded up to whole seconds for the `Retry-After`
    /// header; at least 1 on denial so clients never retry immediately.
    pub fn retry_after_secs(&self) -> u64 {
        if self.retry_after.is_zero() {
            return 0;
        }
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}
