use crate::events::BreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use std::sync::Arc;
use std::time::Duration;
use tower_edgeguard_core::{Clock, EventSink, SystemClock};

/// Configuration for a [`CircuitBreaker`].
pub struct BreakerConfig {
    pub(crate) failure_threshold: usize,
    pub(crate) recovery_timeout: Duration,
    pub(crate) name: String,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: EventSink<BreakerEvent>,
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    failure_threshold: usize,
    recovery_timeout: Duration,
    name: String,
    clock: Arc<dyn Clock>,
    events: EventSink<BreakerEvent>,
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - failure_threshold: 5 consecutive failures
    /// - recovery_timeout: 30 seconds
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            name: "<unnamed>".to_string(),
            clock: Arc::new(SystemClock),
            events: EventSink::new(),
        }
    }

    /// Sets how many consecutive failures open the circuit.
    ///
    /// A zero threshold is clamped to one: the circuit must survive at
    /// least a single success.
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the circuit stays open before probing recovery.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets the name for this breaker instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the clock. Tests use this to drive recovery timing.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a callback for the moment the circuit opens.
    ///
    /// This is the degradation-manager wiring point: pass a closure that
    /// forwards to [`crate::DegradationManager::on_circuit_open`].
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let BreakerEvent::StateTransition {
                to: CircuitState::Open,
                ..
            } = event
            {
                f();
            }
        });
        self
    }

    /// Registers a callback for the moment the circuit closes again.
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let BreakerEvent::StateTransition {
                to: CircuitState::Closed,
                ..
            } = event
            {
                f();
            }
        });
        self
    }

    /// Registers a callback for every state transition.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let BreakerEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        });
        self
    }

    /// Builds the breaker.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: self.recovery_timeout,
            name: self.name,
            clock: self.clock,
            events: self.events,
        })
    }
}
