//! Composable HTTP edge protection for Tower services.
//!
//! `tower-edgeguard` bundles the middleware an API service puts in
//! front of its handlers to decide whether a cross-origin or
//! rate-limited request passes, gets throttled, or gets decorated with
//! security headers. Each subsystem is an individual crate and a
//! feature of this meta-crate:
//!
//! - **Rate limiting** (`ratelimit`) — keyed sliding-window limiting by
//!   client IP or authenticated user, over a pluggable store with LRU
//!   bounds, guarded by a circuit breaker and a degradation manager.
//! - **Circuit breaker + degradation** (`breaker`) — fail-open failure
//!   isolation around the limiter, and graded limit relaxation under
//!   stress.
//! - **CORS** (`cors`) — origin validation, preflight short-circuits,
//!   response header emission.
//! - **CSP** (`csp`) — longest-prefix path routing over
//!   Content-Security-Policy directive sets.
//! - **Config** (`config`) — environment-driven, fail-closed
//!   configuration loading.
//!
//! # Quick start
//!
//! ```
//! use tower_edgeguard::{EdgeGuard, MapSource, EdgeConfig};
//! use tower::ServiceBuilder;
//!
//! # fn handler() -> impl tower::Service<
//! #     http::Request<String>,
//! #     Response = http::Response<String>,
//! #     Error = std::convert::Infallible,
//! # > + Clone {
//! #     tower::service_fn(|_req: http::Request<String>| async {
//! #         Ok(http::Response::new(String::new()))
//! #     })
//! # }
//! let source = MapSource::new()
//!     .set("CORS_ALLOWED_ORIGINS", "https://app.example")
//!     .set("RATE_LIMIT_IP_LIMIT", "100");
//! let config = EdgeConfig::load(&source).expect("valid config");
//! let guard = EdgeGuard::from_config(&config).expect("valid wiring");
//!
//! let service = ServiceBuilder::new()
//!     .layer(guard.cors)
//!     .layer(guard.csp)
//!     .layer(guard.ip_ratelimit)
//!     .layer(guard.user_ratelimit)
//!     .service(handler());
//! ```
//!
//! The server remains an external collaborator: it inserts
//! [`ratelimit::PeerAddr`] (and optionally
//! [`ratelimit::AuthenticatedUser`]) as request extensions and drives
//! periodic store cleanup; everything else happens in the layers.

pub use tower_edgeguard_core::{Clock, EdgeEvent, EventSink, ManualClock, SystemClock};

#[cfg(feature = "breaker")]
pub use tower_edgeguard_breaker as breaker;
#[cfg(feature = "breaker")]
pub use tower_edgeguard_breaker::{
    BreakerOutcome, CircuitBreaker, CircuitState, DegradationLevel, DegradationManager,
};

#[cfg(feature = "ratelimit")]
pub use tower_edgeguard_ratelimit as ratelimit;
#[cfg(feature = "ratelimit")]
pub use tower_edgeguard_ratelimit::{
    IpRateLimitConfig, IpRateLimitLayer, MemoryStore, RateLimitStore, UserRateLimitConfig,
    UserRateLimitLayer,
};

#[cfg(feature = "cors")]
pub use tower_edgeguard_cors as cors;
#[cfg(feature = "cors")]
pub use tower_edgeguard_cors::{CorsConfig, CorsLayer, OriginValidator, WhitelistValidator};

#[cfg(feature = "csp")]
pub use tower_edgeguard_csp as csp;
#[cfg(feature = "csp")]
pub use tower_edgeguard_csp::{CspConfig, CspDirectives, CspLayer};

#[cfg(feature = "config")]
pub use tower_edgeguard_config as config;
#[cfg(feature = "config")]
pub use tower_edgeguard_config::{ConfigError, ConfigSource, EdgeConfig, EnvSource, MapSource};

#[cfg(feature = "compose")]
mod compose;
#[cfg(feature = "compose")]
pub use compose::EdgeGuard;
