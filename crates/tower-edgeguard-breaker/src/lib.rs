//! Circuit breaker for the edgeguard rate-limit path.
//!
//! The breaker isolates failures of the rate-limit backend so a broken
//! limiter never takes the service down with it. Unlike a classic
//! downstream-protecting breaker, this one **fails open**: while the
//! circuit is open the guarded operation is not run and the caller
//! proceeds as if the check had allowed the request. Rate limiting
//! exists for protection; when the limiter itself is broken,
//! availability wins over strict enforcement.
//!
//! ## States
//! - **Closed**: normal operation, checks run
//! - **Open**: checks are skipped entirely (requests pass)
//! - **Half-Open**: one probe is allowed through to test recovery
//!
//! # Example
//!
//! ```rust
//! use tower_edgeguard_breaker::{BreakerOutcome, CircuitBreaker};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(5)
//!     .recovery_timeout(Duration::from_secs(30))
//!     .name("ip-limiter")
//!     .build();
//!
//! let result: Result<_, std::io::Error> =
//!     breaker.execute(|| Ok::<_, std::io::Error>("checked"));
//! assert!(matches!(result, Ok(BreakerOutcome::Executed("checked"))));
//! ```

mod config;
mod degradation;
mod events;

pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use degradation::{
    DegradationConfig, DegradationConfigBuilder, DegradationLevel, DegradationManager,
    DegradationStats,
};
pub use events::{BreakerEvent, DegradationEvent};

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// The circuit is closed and checks run normally.
    Closed,
    /// The circuit is open and checks are skipped (fail-open).
    Open,
    /// The circuit is half-open and a probe is allowed through.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// What [`CircuitBreaker::execute`] did with the guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerOutcome<T> {
    /// The operation ran and produced a value.
    Executed(T),
    /// The circuit was open; the operation was not run. Callers proceed
    /// as if the check had allowed the request.
    Bypassed,
}

impl<T> BreakerOutcome<T> {
    /// Returns the executed value, if any.
    pub fn executed(self) -> Option<T> {
        match self {
            BreakerOutcome::Executed(value) => Some(value),
            BreakerOutcome::Bypassed => None,
        }
    }
}

/// Point-in-time view of the breaker for introspection endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub last_failure: Option<SystemTime>,
    pub last_state_change: SystemTime,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: usize,
    last_failure: Option<SystemTime>,
    last_state_change: SystemTime,
}

/// Three-state failure isolation around rate-limit calls.
///
/// One instance exists per limiter type and lives for the process
/// lifetime. All state sits behind a single mutex; the lock is held for
/// state reads and outcome recording only, never across the guarded
/// operation or any event subscriber.
pub struct CircuitBreaker {
    config: Arc<BreakerConfig>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker from a finished config.
    pub fn new(config: BreakerConfig) -> Self {
        let now = config.clock.now();
        Self {
            config: Arc::new(config),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                last_state_change: now,
            }),
        }
    }

    /// Starts building a breaker configuration.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Runs `op` under the breaker.
    ///
    /// In `Open` state the operation is **not** run and
    /// [`BreakerOutcome::Bypassed`] is returned; this is the fail-open
    /// contract. Once the recovery timeout has elapsed the circuit moves
    /// to `HalfOpen` and the next call probes the backend. Operation
    /// errors are recorded against the failure threshold and propagated
    /// to the caller.
    pub fn execute<T, E, F>(&self, op: F) -> Result<BreakerOutcome<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let transition;
        {
            let mut inner = self.inner.lock().unwrap();
            let (state, pending) = self.poll_state_locked(&mut inner);
            transition = pending;
            if state == CircuitState::Open {
                drop(inner);
                self.note_bypass();
                return Ok(BreakerOutcome::Bypassed);
            }
        }
        if let Some((from, to)) = transition {
            self.after_transition(from, to);
        }

        match op() {
            Ok(value) => {
                self.record_success();
                Ok(BreakerOutcome::Executed(value))
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }

    /// Always `true`: the breaker never blocks a request, it only skips
    /// the state-mutating check while open.
    pub fn allow(&self) -> bool {
        true
    }

    /// Whether the circuit is currently open.
    ///
    /// Reading the state also performs the time-based `Open -> HalfOpen`
    /// promotion, so a caller that skips work while open cannot pin the
    /// circuit open forever.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// The current state, after any due recovery promotion.
    pub fn state(&self) -> CircuitState {
        let (state, transition) = {
            let mut inner = self.inner.lock().unwrap();
            self.poll_state_locked(&mut inner)
        };
        if let Some((from, to)) = transition {
            self.after_transition(from, to);
        }
        state
    }

    /// Number of consecutive failures observed in the closed state.
    pub fn consecutive_failures(&self) -> usize {
        self.inner.lock().unwrap().consecutive_failures
    }

    /// Records a successful check outcome.
    pub fn record_success(&self) {
        let (state, transition) = {
            let mut inner = self.inner.lock().unwrap();
            let pending = match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    self.transition_locked(&mut inner, CircuitState::Closed)
                }
                // The breaker did not run the op while open; a stray
                // success report here carries no signal.
                CircuitState::Open => None,
            };
            (inner.state, pending)
        };

        self.config.events.publish(&BreakerEvent::SuccessRecorded {
            name: self.config.name.clone(),
            state,
        });
        if let Some((from, to)) = transition {
            self.after_transition(from, to);
        }
    }

    /// Records a failed check outcome.
    pub fn record_failure(&self) {
        let now = self.config.clock.now();
        let (state, failures, transition) = {
            let mut inner = self.inner.lock().unwrap();
            inner.last_failure = Some(now);
            let pending = match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.config.failure_threshold {
                        self.transition_locked(&mut inner, CircuitState::Open)
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    inner.consecutive_failures += 1;
                    self.transition_locked(&mut inner, CircuitState::Open)
                }
                CircuitState::Open => None,
            };
            (inner.state, inner.consecutive_failures, pending)
        };

        self.config.events.publish(&BreakerEvent::FailureRecorded {
            name: self.config.name.clone(),
            state,
            consecutive_failures: failures,
        });
        if let Some((from, to)) = transition {
            self.after_transition(from, to);
        }
    }

    /// Manually closes the circuit and clears counters.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            inner.consecutive_failures = 0;
            inner.last_failure = None;
            self.transition_locked(&mut inner, CircuitState::Closed)
        };
        if let Some((from, to)) = transition {
            self.after_transition(from, to);
        }
    }

    /// Returns a consistent snapshot of the breaker state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().unwrap();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure: inner.last_failure,
            last_state_change: inner.last_state_change,
        }
    }

    /// Promotes `Open` to `HalfOpen` once the recovery timeout has
    /// elapsed. Must be called with the lock held; the returned
    /// transition is emitted by the caller after unlocking.
    fn poll_state_locked(
        &self,
        inner: &mut BreakerInner,
    ) -> (CircuitState, Option<(CircuitState, CircuitState)>) {
        if inner.state == CircuitState::Open {
            let elapsed = self
                .config
                .clock
                .now()
                .duration_since(inner.last_state_change)
                .unwrap_or_default();
            if elapsed >= self.config.recovery_timeout {
                let transition = self.transition_locked(inner, CircuitState::HalfOpen);
                return (inner.state, transition);
            }
        }
        (inner.state, None)
    }

    fn transition_locked(
        &self,
        inner: &mut BreakerInner,
        to: CircuitState,
    ) -> Option<(CircuitState, CircuitState)> {
        if inner.state == to {
            return None;
        }
        let from = inner.state;
        inner.state = to;
        inner.last_state_change = self.config.clock.now();
        if to == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
        Some((from, to))
    }

    fn after_transition(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.config.name,
                from = from.as_str(),
                "circuit breaker opened; rate-limit checks will be skipped"
            ),
            CircuitState::HalfOpen => tracing::info!(
                breaker = %self.config.name,
                "circuit breaker half-open; probing the backend"
            ),
            CircuitState::Closed => tracing::info!(
                breaker = %self.config.name,
                "circuit breaker closed; backend recovered"
            ),
        }

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "edgeguard_breaker_transitions_total",
            "breaker" => self.config.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);

        self.config.events.publish(&BreakerEvent::StateTransition {
            name: self.config.name.clone(),
            from,
            to,
        });
    }

    fn note_bypass(&self) {
        tracing::debug!(breaker = %self.config.name, "circuit open, skipping check");

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "edgeguard_breaker_bypassed_total",
            "breaker" => self.config.name.clone()
        )
        .increment(1);

        self.config.events.publish(&BreakerEvent::CallBypassed {
            name: self.config.name.clone(),
        });
    }
}
