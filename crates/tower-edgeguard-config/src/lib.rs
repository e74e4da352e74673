//! Configuration loading for the edgeguard middleware stack.
//!
//! The core consumes a [`ConfigSource`] — an environment-like
//! key/value interface — and produces a typed, validated
//! [`EdgeConfig`]. Validation is strictly fail-closed: a process with
//! malformed edge-protection settings refuses to start.
//!
//! ```
//! use tower_edgeguard_config::{EdgeConfig, MapSource};
//!
//! let source = MapSource::new()
//!     .set("CORS_ALLOWED_ORIGINS", "https://app.example")
//!     .set("RATE_LIMIT_IP_LIMIT", "60");
//! let config = EdgeConfig::load(&source).expect("valid configuration");
//! assert_eq!(config.rate_limit.ip_limit, 60);
//! ```

mod error;
mod settings;
mod source;

pub use error::ConfigError;
pub use settings::{
    BreakerSettings, CorsSettings, CspSettings, EdgeConfig, QuotaSetting, RateLimitSettings,
    TierSettings,
};
pub use source::{ConfigSource, EnvSource, MapSource};
