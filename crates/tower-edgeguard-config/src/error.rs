use thiserror::Error;

/// Configuration failures. All of them are fail-closed: a process with
/// malformed edge-protection config must refuse to start rather than
/// run with a policy nobody chose.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration key {0}")]
    MissingKey(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("invalid method {0:?}: must be one of GET, POST, PUT, DELETE, PATCH, OPTIONS")]
    InvalidMethod(String),

    #[error("TRUST_PROXY is enabled but TRUSTED_PROXIES is empty")]
    NoTrustedProxies,
}
