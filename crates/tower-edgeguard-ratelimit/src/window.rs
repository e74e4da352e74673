//! Sliding-window admission over a pluggable store, with a clock-skew
//! guard.
//!
//! The window never trusts a timestamp older than the last one it saw
//! for a key: an attacker-influenced NTP jump backward would otherwise
//! reset everyone's windows. When the clock runs backward the last seen
//! timestamp is substituted and a warning recorded; forward motion
//! updates the record.

use crate::decision::{LimiterType, RateLimitDecision};
use crate::error::RateLimitError;
use crate::events::RateLimitEvent;
use crate::store::RateLimitStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tower_edgeguard_core::{Clock, EventSink};

/// Sliding-window rate-limit algorithm.
///
/// The per-key skew map has its own lock, which is never held across a
/// store call. For a single key, concurrent checks linearize at the
/// store's `check_and_add` critical section.
pub struct SlidingWindow {
    name: String,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    last_seen: Mutex<HashMap<String, SystemTime>>,
    events: EventSink<RateLimitEvent>,
}

impl SlidingWindow {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_observability(store, clock, "<unnamed>", EventSink::new())
    }

    pub(crate) fn with_observability(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        name: impl Into<String>,
        events: EventSink<RateLimitEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            clock,
            last_seen: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Runs one admission check for `key` against `limit` per `window`.
    pub fn check(
        &self,
        key: &str,
        limit: usize,
        window: Duration,
        limiter: LimiterType,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let now = self.skew_guarded_now(key);
        let cutoff = now.checked_sub(window).unwrap_or(UNIX_EPOCH);
        let outcome = self.store.check_and_add(key, now, cutoff, limit)?;

        let decision = if outcome.allowed {
            RateLimitDecision {
                key: key.to_owned(),
                allowed: true,
                limit,
                remaining: limit.saturating_sub(outcome.count),
                reset_at: now + window,
                retry_after: Duration::ZERO,
                window,
                limiter,
            }
        } else {
            // The window opens again when the oldest counted event ages
            // out; backends that cannot report it fall back to a full
            // window.
            let reset_at = outcome.oldest.map(|o| o + window).unwrap_or(now + window);
            let retry_after = reset_at.duration_since(now).unwrap_or(window);
            RateLimitDecision {
                key: key.to_owned(),
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
                retry_after,
                window,
                limiter,
            }
        };
        Ok(decision)
    }

    /// Drops skew-map records older than `max_age`. Driven by the same
    /// external trigger as store cleanup.
    pub fn cleanup_skew(&self, max_age: Duration) {
        let now = self.clock.now();
        let mut last_seen = self.last_seen.lock().unwrap();
        last_seen.retain(|_, &mut seen| {
            now.duration_since(seen)
                .map(|age| age < max_age)
                .unwrap_or(true)
        });
    }

    #[cfg(test)]
    pub(crate) fn skew_entries(&self) -> usize {
        self.last_seen.lock().unwrap().len()
    }

    fn skew_guarded_now(&self, key: &str) -> SystemTime {
        let observed = self.clock.now();
        let substituted = {
            let mut last_seen = self.last_seen.lock().unwrap();
            match last_seen.get_mut(key) {
                Some(last) if observed < *last => Some(*last),
                Some(last) => {
                    *last = observed;
                    None
                }
                None => {
                    last_seen.insert(key.to_owned(), observed);
                    None
                }
            }
        };

        match substituted {
            Some(substituted) => {
                tracing::warn!(
                    limiter = %self.name,
                    key,
                    "clock moved backward; substituting last seen timestamp"
                );
                self.events.publish(&RateLimitEvent::ClockSkew {
                    name: self.name.clone(),
                    key: key.to_owned(),
                    observed,
                    substituted,
                });
                substituted
            }
            None => observed,
        }
    }
}
