use thiserror::Error;

/// Errors surfaced by a [`crate::RateLimitStore`] backend.
///
/// The bundled in-memory store never fails; remote implementations
/// surface transient backend faults here. Callers treat these as
/// transient: the middleware fails open and the circuit breaker counts
/// them toward its threshold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("rate-limit store backend failed: {0}")]
    Backend(String),
}

/// Errors from client-key extraction.
///
/// Extraction failures are never fatal to a request: the middleware
/// logs, skips the check, and lets the request through. Construction
/// errors (`NoTrustedProxies`) are fail-closed at startup instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("request carries no peer address")]
    MissingPeerAddr,
    #[error("trusted-proxy mode enabled with no trusted prefixes")]
    NoTrustedProxies,
}

/// Errors from the sliding-window algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
