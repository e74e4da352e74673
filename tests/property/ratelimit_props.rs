//! Properties of the sliding-window algorithm.
//!
//! Invariants tested:
//! - Exactly `min(n, limit)` requests pass inside one window
//! - `0 <= remaining <= limit`; denial implies zero remaining and a
//!   positive retry-after
//! - A clock that jumps backward produces the same decision stream as
//!   its monotonically-clamped twin

use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tower_edgeguard_core::{Clock, ManualClock};
use tower_edgeguard_ratelimit::{LimiterType, MemoryStore, SlidingWindow};

fn window_at(start_secs: u64) -> (SlidingWindow, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_epoch_secs(start_secs));
    let store = Arc::new(MemoryStore::new(10_000));
    let window = SlidingWindow::new(store, Arc::clone(&clock) as Arc<dyn Clock>);
    (window, clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// With a frozen clock, admission is exactly min(n, limit).
    #[test]
    fn admits_exactly_min_of_n_and_limit(
        limit in 1usize..=30,
        requests in 1usize..=100,
    ) {
        let (window, _clock) = window_at(50_000);

        let allowed = (0..requests)
            .filter(|_| {
                window
                    .check("k", limit, Duration::from_secs(60), LimiterType::Ip)
                    .unwrap()
                    .allowed
            })
            .count();

        prop_assert_eq!(allowed, limit.min(requests));
    }

    /// Decision invariants hold whatever the request spacing.
    #[test]
    fn decision_invariants_hold(
        limit in 1usize..=20,
        steps in prop::collection::vec(0u64..5_000, 1..60),
    ) {
        let (window, clock) = window_at(80_000);

        for step_ms in steps {
            let decision = window
                .check("k", limit, Duration::from_secs(10), LimiterType::Ip)
                .unwrap();

            prop_assert!(decision.remaining <= decision.limit);
            if decision.allowed {
                prop_assert!(decision.retry_after.is_zero());
            } else {
                prop_assert_eq!(decision.remaining, 0);
                prop_assert!(decision.retry_after > Duration::ZERO);
                prop_assert!(decision.retry_after <= decision.window);
            }
            clock.advance(Duration::from_millis(step_ms));
        }
    }

    /// Moving the clock backward and forward yields the same decision
    /// stream as if time had moved monotonically.
    #[test]
    fn skewed_and_clamped_clocks_decide_identically(
        deltas in prop::collection::vec(-40i64..40, 1..50),
    ) {
        let (skewed, skewed_clock) = window_at(100_000);
        let (clamped, clamped_clock) = window_at(100_000);

        let mut raw_secs: u64 = 100_000;
        let mut clamped_secs: u64 = 100_000;

        for delta in deltas {
            raw_secs = raw_secs.saturating_add_signed(delta);
            clamped_secs = clamped_secs.max(raw_secs);

            skewed_clock.set(UNIX_EPOCH + Duration::from_secs(raw_secs));
            clamped_clock.set(UNIX_EPOCH + Duration::from_secs(clamped_secs));

            let a = skewed
                .check("k", 5, Duration::from_secs(30), LimiterType::Ip)
                .unwrap();
            let b = clamped
                .check("k", 5, Duration::from_secs(30), LimiterType::Ip)
                .unwrap();

            prop_assert_eq!(a.allowed, b.allowed);
            prop_assert_eq!(a.remaining, b.remaining);
            prop_assert_eq!(a.reset_at, b.reset_at);
        }
    }

    /// Limiting one key never changes another key's decisions.
    #[test]
    fn keys_are_independent(
        noise_requests in 1usize..=50,
    ) {
        let (window, _clock) = window_at(60_000);

        for _ in 0..noise_requests {
            let _ = window.check("noisy", 3, Duration::from_secs(60), LimiterType::Ip);
        }

        let quiet = window
            .check("quiet", 3, Duration::from_secs(60), LimiterType::Ip)
            .unwrap();
        prop_assert!(quiet.allowed);
        prop_assert_eq!(quiet.remaining, 2);
    }
}
