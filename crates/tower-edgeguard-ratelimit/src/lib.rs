//! Keyed sliding-window rate limiting middleware for Tower HTTP
//! services.
//!
//! Two limiter variants share one engine: per-client-IP (with
//! trusted-proxy-safe extraction) and per-authenticated-user (with
//! tiered quotas and digested store keys). The engine is a sliding-log
//! window over a pluggable [`RateLimitStore`], guarded by a circuit
//! breaker and scaled by a degradation manager, both from
//! [`tower_edgeguard_breaker`].
//!
//! # Examples
//!
//! ```
//! use tower_edgeguard_ratelimit::IpRateLimitConfig;
//! use tower::ServiceBuilder;
//! use std::time::Duration;
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
//! // 100 requests per minute per client IP.
//! let rate_limit = IpRateLimitConfig::builder()
//!     .limit(100)
//!     .window(Duration::from_secs(60))
//!     .on_denied(|retry_after| {
//!         println!("denied, retry in {retry_after:?}");
//!     })
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(rate_limit)
//!     .service(handler());
//! ```
//!
//! Every response that completed a check carries `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining`, `X-RateLimit-Reset` (UNIX seconds) and
//! `X-RateLimit-Type`; denials short-circuit with `429`, `Retry-After`,
//! and a JSON body. Internal failures never block a request: the
//! middleware fails open and the breaker isolates a broken store.

mod config;
mod decision;
mod error;
mod events;
mod extract;
mod layer;
mod lru;
mod service;
mod store;
mod user;
mod window;

pub use config::{
    IpRateLimitConfig, IpRateLimitConfigBuilder, UserRateLimitConfig, UserRateLimitConfigBuilder,
};
pub use decision::{LimiterType, RateLimitDecision};
pub use error::{ExtractError, RateLimitError, StoreError};
pub use events::{BypassReason, RateLimitEvent};
pub use extract::{ClientIpExtractor, DirectIpExtractor, PeerAddr, TrustedProxyIpExtractor};
pub use layer::{IpRateLimitLayer, UserRateLimitLayer};
pub use service::{IpRateLimit, UserRateLimit};
pub use store::{CheckAndAdd, MemoryStore, RateLimitStore};
pub use user::{
    hashed_user_key, AnonymousPolicy, AuthenticatedUser, BasicTierProvider, TierProvider,
    TierQuota, TierQuotas, UserTier,
};
pub use window::SlidingWindow;
