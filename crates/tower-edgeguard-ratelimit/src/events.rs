//! Events published by the rate-limit middleware.

use crate::decision::LimiterType;
use std::time::{Duration, SystemTime};
use tower_edgeguard_core::EdgeEvent;

/// Why a request went through without a completed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// The limiter is globally disabled.
    Disabled,
    /// The circuit breaker is open.
    CircuitOpen,
    /// The degradation manager turned enforcement off.
    DegradationDisabled,
    /// No client key could be derived from the request.
    ExtractionFailed,
    /// No authenticated user and the policy skips anonymous traffic.
    Unauthenticated,
    /// The store or algorithm failed mid-check.
    LimiterFault,
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::Disabled => "disabled",
            BypassReason::CircuitOpen => "circuit_open",
            BypassReason::DegradationDisabled => "degradation_disabled",
            BypassReason::ExtractionFailed => "extraction_failed",
            BypassReason::Unauthenticated => "unauthenticated",
            BypassReason::LimiterFault => "limiter_fault",
        }
    }
}

/// Events published by the IP and user rate limiters.
#[derive(Debug, Clone)]
pub enum RateLimitEvent {
    /// A request was checked and allowed.
    RequestAllowed {
        name: String,
        key: String,
        limiter: LimiterType,
        remaining: usize,
    },
    /// A request was checked and denied.
    RequestDenied {
        name: String,
        key: String,
        limiter: LimiterType,
        retry_after: Duration,
    },
    /// A request passed without a completed check.
    CheckBypassed {
        name: String,
        limiter: LimiterType,
        reason: BypassReason,
    },
    /// The wall clock moved backward for a key; the last seen timestamp
    /// was substituted.
    ClockSkew {
        name: String,
        key: String,
        observed: SystemTime,
        substituted: SystemTime,
    },
}

impl EdgeEvent for RateLimitEvent {
    fn kind(&self) -> &'static str {
        match self {
            RateLimitEvent::RequestAllowed { .. } => "request_allowed",
            RateLimitEvent::RequestDenied { .. } => "request_denied",
            RateLimitEvent::CheckBypassed { .. } => "check_bypassed",
            RateLimitEvent::ClockSkew { .. } => "clock_skew",
        }
    }

    fn component(&self) -> &str {
        match self {
            RateLimitEvent::RequestAllowed { name, .. }
            | RateLimitEvent::RequestDenied { name, .. }
            | RateLimitEvent::CheckBypassed { name, .. }
            | RateLimitEvent::ClockSkew { name, .. } => name,
        }
    }
}
