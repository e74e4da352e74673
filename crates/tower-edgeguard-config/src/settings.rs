//! Typed edge-protection configuration and its fail-closed loader.
//!
//! Key names are an operational contract; renaming one is a breaking
//! change for every deployment manifest that sets it.

use crate::error::ConfigError;
use crate::source::ConfigSource;
use ipnet::IpNet;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
const CORS_ALLOWED_METHODS: &str = "CORS_ALLOWED_METHODS";
const CORS_ALLOWED_HEADERS: &str = "CORS_ALLOWED_HEADERS";
const CORS_MAX_AGE: &str = "CORS_MAX_AGE";
const TRUST_PROXY: &str = "TRUST_PROXY";
const TRUSTED_PROXIES: &str = "TRUSTED_PROXIES";
const RATE_LIMIT_ENABLED: &str = "RATE_LIMIT_ENABLED";
const RATE_LIMIT_IP_LIMIT: &str = "RATE_LIMIT_IP_LIMIT";
const RATE_LIMIT_IP_WINDOW_SECS: &str = "RATE_LIMIT_IP_WINDOW_SECS";
const RATE_LIMIT_USER_LIMIT: &str = "RATE_LIMIT_USER_LIMIT";
const RATE_LIMIT_USER_WINDOW_SECS: &str = "RATE_LIMIT_USER_WINDOW_SECS";
const RATE_LIMIT_TIER_ADMIN: &str = "RATE_LIMIT_TIER_ADMIN";
const RATE_LIMIT_TIER_PREMIUM: &str = "RATE_LIMIT_TIER_PREMIUM";
const RATE_LIMIT_TIER_BASIC: &str = "RATE_LIMIT_TIER_BASIC";
const RATE_LIMIT_TIER_VIEWER: &str = "RATE_LIMIT_TIER_VIEWER";
const RATE_LIMIT_MAX_KEYS: &str = "RATE_LIMIT_MAX_KEYS";
const RATE_LIMIT_CLEANUP_INTERVAL_SECS: &str = "RATE_LIMIT_CLEANUP_INTERVAL_SECS";
const CIRCUIT_BREAKER_THRESHOLD: &str = "CIRCUIT_BREAKER_THRESHOLD";
const CIRCUIT_BREAKER_RECOVERY_SECS: &str = "CIRCUIT_BREAKER_RECOVERY_SECS";
const CSP_ENABLED: &str = "CSP_ENABLED";
const CSP_REPORT_ONLY: &str = "CSP_REPORT_ONLY";

const VALID_METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"];

/// The full, validated edge-protection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeConfig {
    pub cors: CorsSettings,
    pub rate_limit: RateLimitSettings,
    pub breaker: BreakerSettings,
    pub csp: CspSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_secs: u64,
}

/// A `(limit, window)` pair as configured for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSetting {
    pub limit: usize,
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSettings {
    pub admin: QuotaSetting,
    pub premium: QuotaSetting,
    pub basic: QuotaSetting,
    pub viewer: QuotaSetting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub ip_limit: usize,
    pub ip_window: Duration,
    /// Fallback quota for users whose tier has no explicit setting.
    pub user_limit: usize,
    pub user_window: Duration,
    pub tiers: TierSettings,
    pub max_keys: usize,
    pub cleanup_interval: Duration,
    pub trust_proxy: bool,
    pub trusted_proxies: Vec<IpNet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: usize,
    pub recovery_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CspSettings {
    pub enabled: bool,
    pub report_only: bool,
}

impl EdgeConfig {
    /// Loads and validates the whole configuration. Any malformed or
    /// missing-but-required value is an error; startup is the only
    /// place where failing closed is cheap.
    pub fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let cors = CorsSettings::load(source)?;
        let rate_limit = RateLimitSettings::load(source)?;
        let breaker = BreakerSettings::load(source)?;
        let csp = CspSettings::load(source)?;
        tracing::info!(
            origins = cors.allowed_origins.len(),
            rate_limit_enabled = rate_limit.enabled,
            csp_enabled = csp.enabled,
            "edge-protection configuration loaded"
        );
        Ok(Self {
            cors,
            rate_limit,
            breaker,
            csp,
        })
    }
}

impl CorsSettings {
    fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let raw_origins = source
            .get(CORS_ALLOWED_ORIGINS)
            .ok_or(ConfigError::MissingKey(CORS_ALLOWED_ORIGINS))?;
        let allowed_origins = split_list(&raw_origins);
        if allowed_origins.is_empty() {
            return Err(ConfigError::MissingKey(CORS_ALLOWED_ORIGINS));
        }
        for origin in &allowed_origins {
            validate_origin(origin)?;
        }

        let allowed_methods = match source.get(CORS_ALLOWED_METHODS) {
            Some(raw) => {
                let methods: Vec<String> = split_list(&raw)
                    .iter()
                    .map(|m| m.to_ascii_uppercase())
                    .collect();
                for method in &methods {
                    if !VALID_METHODS.contains(&method.as_str()) {
                        return Err(ConfigError::InvalidMethod(method.clone()));
                    }
                }
                methods
            }
            None => vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
        };

        let allowed_headers = match source.get(CORS_ALLOWED_HEADERS) {
            Some(raw) => split_list(&raw),
            None => vec!["Content-Type".to_string(), "Authorization".to_string()],
        };

        Ok(Self {
            allowed_origins,
            allowed_methods,
            allowed_headers,
            max_age_secs: parse_or(source, CORS_MAX_AGE, 3_600)?,
        })
    }
}

impl RateLimitSettings {
    fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let trust_proxy = parse_bool_or(source, TRUST_PROXY, false)?;
        let trusted_proxies = match source.get(TRUSTED_PROXIES) {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|prefix| {
                    prefix.parse::<IpNet>().map_err(|e| ConfigError::InvalidValue {
                        key: TRUSTED_PROXIES,
                        value: prefix.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        if trust_proxy && trusted_proxies.is_empty() {
            return Err(ConfigError::NoTrustedProxies);
        }

        let user_limit = parse_or(source, RATE_LIMIT_USER_LIMIT, 100)?;
        let user_window = Duration::from_secs(parse_or(source, RATE_LIMIT_USER_WINDOW_SECS, 60)?);
        let fallback = QuotaSetting {
            limit: user_limit,
            window: user_window,
        };

        Ok(Self {
            enabled: parse_bool_or(source, RATE_LIMIT_ENABLED, true)?,
            ip_limit: parse_or(source, RATE_LIMIT_IP_LIMIT, 100)?,
            ip_window: Duration::from_secs(parse_or(source, RATE_LIMIT_IP_WINDOW_SECS, 60)?),
            user_limit,
            user_window,
            tiers: TierSettings {
                admin: parse_quota(source, RATE_LIMIT_TIER_ADMIN, QuotaSetting {
                    limit: 1_000,
                    window: Duration::from_secs(60),
                })?,
                premium: parse_quota(source, RATE_LIMIT_TIER_PREMIUM, QuotaSetting {
                    limit: 500,
                    window: Duration::from_secs(60),
                })?,
                basic: parse_quota(source, RATE_LIMIT_TIER_BASIC, fallback)?,
                viewer: parse_quota(source, RATE_LIMIT_TIER_VIEWER, QuotaSetting {
                    limit: 20,
                    window: Duration::from_secs(60),
                })?,
            },
            max_keys: parse_or(source, RATE_LIMIT_MAX_KEYS, 10_000)?,
            cleanup_interval: Duration::from_secs(parse_or(
                source,
                RATE_LIMIT_CLEANUP_INTERVAL_SECS,
                300,
            )?),
            trust_proxy,
            trusted_proxies,
        })
    }
}

impl BreakerSettings {
    fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            failure_threshold: parse_or(source, CIRCUIT_BREAKER_THRESHOLD, 5)?,
            recovery_timeout: Duration::from_secs(parse_or(
                source,
                CIRCUIT_BREAKER_RECOVERY_SECS,
                30,
            )?),
        })
    }
}

impl CspSettings {
    fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_or(source, CSP_ENABLED, true)?,
            report_only: parse_bool_or(source, CSP_REPORT_ONLY, false)?,
        })
    }
}

/// Origins must be bare http(s) URLs: scheme + host (+ port), nothing
/// else. Everything beyond that changes what the browser would send as
/// `Origin` and could never match.
fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    let err = |reason: &str| ConfigError::InvalidOrigin {
        origin: origin.to_string(),
        reason: reason.to_string(),
    };

    if origin.ends_with('/') {
        return Err(err("must not have a trailing slash"));
    }
    let url = Url::parse(origin).map_err(|e| err(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(err("scheme must be http or https"));
    }
    if !url.path().is_empty() && url.path() != "/" {
        return Err(err("must not contain a path"));
    }
    if url.query().is_some() {
        return Err(err("must not contain a query"));
    }
    if url.fragment().is_some() {
        return Err(err("must not contain a fragment"));
    }
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T>(source: &dyn ConfigSource, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn parse_bool_or(
    source: &dyn ConfigSource,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match source.get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key,
                value: raw,
                reason: "expected true/false".to_string(),
            }),
        },
        None => Ok(default),
    }
}

/// Tier quotas use the `limit:window_secs` form, e.g. `500:60`.
fn parse_quota(
    source: &dyn ConfigSource,
    key: &'static str,
    default: QuotaSetting,
) -> Result<QuotaSetting, ConfigError> {
    let Some(raw) = source.get(key) else {
        return Ok(default);
    };
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key,
        value: raw.clone(),
        reason: reason.to_string(),
    };

    let mut parts = raw.trim().split(':');
    let (limit, window_secs) = match (parts.next(), parts.next(), parts.next()) {
        (Some(limit), Some(window), None) => (limit, window),
        _ => return Err(invalid("expected limit:window_secs")),
    };
    let limit = limit
        .parse::<usize>()
        .map_err(|_| invalid("limit must be a non-negative integer"))?;
    let window_secs = window_secs
        .parse::<u64>()
        .map_err(|_| invalid("window must be seconds"))?;
    Ok(QuotaSetting {
        limit,
        window: Duration::from_secs(window_secs),
    })
}
