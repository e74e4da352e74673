//! Breaker-to-degradation wiring and recovery probing.

use std::sync::Arc;
use std::time::Duration;
use tower_edgeguard_breaker::{
    BreakerOutcome, CircuitBreaker, CircuitState, DegradationLevel, DegradationManager,
};
use tower_edgeguard_core::{Clock, ManualClock};

fn wired() -> (CircuitBreaker, Arc<DegradationManager>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_epoch_secs(100_000));
    let degradation = Arc::new(
        DegradationManager::builder()
            .cooldown(Duration::ZERO)
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .name("wired")
            .build(),
    );
    let on_open = Arc::clone(&degradation);
    let on_close = Arc::clone(&degradation);
    let breaker = CircuitBreaker::builder()
        .failure_threshold(2)
        .recovery_timeout(Duration::from_secs(30))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .name("wired")
        .on_open(move || on_open.on_circuit_open())
        .on_close(move || on_close.on_circuit_close())
        .build();
    (breaker, degradation, clock)
}

#[test]
fn opening_the_circuit_relaxes_limits() {
    let (breaker, degradation, _clock) = wired();
    assert_eq!(degradation.level(), DegradationLevel::Normal);

    let _ = breaker.execute(|| Err::<(), _>("down"));
    let _ = breaker.execute(|| Err::<(), _>("down"));
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(degradation.level(), DegradationLevel::Relaxed);
    assert_eq!(degradation.adjust_limits(100), 200);
}

#[test]
fn recovery_closes_the_circuit_and_restores_limits() {
    let (breaker, degradation, clock) = wired();
    let _ = breaker.execute(|| Err::<(), _>("down"));
    let _ = breaker.execute(|| Err::<(), _>("down"));
    assert_eq!(degradation.level(), DegradationLevel::Relaxed);

    // Recovery timeout elapses; the next call is the half-open probe.
    clock.advance(Duration::from_secs(31));
    let result = breaker.execute(|| Ok::<_, &str>("healthy"));
    assert!(matches!(result, Ok(BreakerOutcome::Executed("healthy"))));
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(degradation.level(), DegradationLevel::Normal);
    assert_eq!(degradation.adjust_limits(100), 100);
}

#[test]
fn failed_probe_reopens_without_touching_flags_twice() {
    let (breaker, degradation, clock) = wired();
    let _ = breaker.execute(|| Err::<(), _>("down"));
    let _ = breaker.execute(|| Err::<(), _>("down"));

    clock.advance(Duration::from_secs(31));
    let _ = breaker.execute(|| Err::<(), _>("still down"));
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(degradation.level(), DegradationLevel::Relaxed);
    assert!(degradation.stats().circuit_open);
}
