//! Events published by the circuit breaker and the degradation
//! manager.

use crate::{CircuitState, DegradationLevel};
use tower_edgeguard_core::EdgeEvent;

/// Events published by [`crate::CircuitBreaker`].
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        name: String,
        from: CircuitState,
        to: CircuitState,
    },
    /// The circuit was open and the guarded operation was skipped.
    CallBypassed { name: String },
    /// A guarded operation succeeded.
    SuccessRecorded { name: String, state: CircuitState },
    /// A guarded operation failed.
    FailureRecorded {
        name: String,
        state: CircuitState,
        consecutive_failures: usize,
    },
}

impl EdgeEvent for BreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallBypassed { .. } => "call_bypassed",
            BreakerEvent::SuccessRecorded { .. } => "success_recorded",
            BreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn component(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { name, .. }
            | BreakerEvent::CallBypassed { name }
            | BreakerEvent::SuccessRecorded { name, .. }
            | BreakerEvent::FailureRecorded { name, .. } => name,
        }
    }
}

/// Events published by [`crate::DegradationManager`].
#[derive(Debug, Clone)]
pub enum DegradationEvent {
    /// The effective enforcement level changed.
    LevelChanged {
        name: String,
        from: DegradationLevel,
        to: DegradationLevel,
    },
}

impl EdgeEvent for DegradationEvent {
    fn kind(&self) -> &'static str {
        match self {
            DegradationEvent::LevelChanged { .. } => "level_changed",
        }
    }

    fn component(&self) -> &str {
        match self {
            DegradationEvent::LevelChanged { name, .. } => name,
        }
    }
}
