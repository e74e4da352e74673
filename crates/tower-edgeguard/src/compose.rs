//! The composition root: every subsystem built and wired from one
//! validated [`EdgeConfig`].

use http::{HeaderName, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_edgeguard_breaker::{CircuitBreaker, DegradationManager};
use tower_edgeguard_config::{ConfigError, CspSettings, EdgeConfig};
use tower_edgeguard_cors::{CorsConfig, CorsLayer};
use tower_edgeguard_csp::{CspConfig, CspDirectives, CspLayer};
use tower_edgeguard_ratelimit::{
    ClientIpExtractor, DirectIpExtractor, IpRateLimitConfig, IpRateLimitLayer, MemoryStore,
    RateLimitStore, TierQuota, TierQuotas, TrustedProxyIpExtractor, UserRateLimitConfig,
    UserRateLimitLayer, UserTier,
};

/// The assembled edge-protection stack.
///
/// Layers are plain values: move them into a `ServiceBuilder` in
/// whatever order the application wants (CORS outermost is the usual
/// choice, so even throttled responses carry their CORS headers).
/// The shared handles stay available for introspection endpoints,
/// manual resets, and the periodic cleanup trigger.
pub struct EdgeGuard {
    pub cors: CorsLayer,
    pub csp: CspLayer,
    pub ip_ratelimit: IpRateLimitLayer,
    pub user_ratelimit: UserRateLimitLayer,
    /// The store shared by both limiters.
    pub store: Arc<MemoryStore>,
    pub ip_breaker: Arc<CircuitBreaker>,
    pub user_breaker: Arc<CircuitBreaker>,
    pub ip_degradation: Arc<DegradationManager>,
    pub user_degradation: Arc<DegradationManager>,
    /// How often the owner should invoke [`EdgeGuard::run_cleanup`];
    /// the core exposes the operation but owns no timer.
    pub cleanup_interval: Duration,
    csp_settings: CspSettings,
}

impl EdgeGuard {
    /// Builds and wires the full stack. The CSP layer starts with the
    /// strict baseline policy; use [`EdgeGuard::with_csp_policies`] to
    /// route per-path directive sets.
    pub fn from_config(config: &EdgeConfig) -> Result<Self, ConfigError> {
        let store = Arc::new(MemoryStore::new(config.rate_limit.max_keys));

        let (ip_breaker, ip_degradation) = breaker_pair(config, "ip-ratelimit");
        let (user_breaker, user_degradation) = breaker_pair(config, "user-ratelimit");

        let extractor: Arc<dyn ClientIpExtractor> = if config.rate_limit.trust_proxy {
            Arc::new(
                TrustedProxyIpExtractor::new(config.rate_limit.trusted_proxies.clone())
                    .map_err(|_| ConfigError::NoTrustedProxies)?,
            )
        } else {
            Arc::new(DirectIpExtractor)
        };

        let ip_ratelimit = IpRateLimitConfig::builder()
            .limit(config.rate_limit.ip_limit)
            .window(config.rate_limit.ip_window)
            .enabled(config.rate_limit.enabled)
            .store(Arc::clone(&store) as Arc<dyn RateLimitStore>)
            .extractor(extractor)
            .circuit_breaker(Arc::clone(&ip_breaker))
            .degradation(Arc::clone(&ip_degradation))
            .build();

        let tiers = &config.rate_limit.tiers;
        let quotas = TierQuotas::new(TierQuota::new(
            config.rate_limit.user_limit,
            config.rate_limit.user_window,
        ))
        .with_quota(UserTier::Admin, TierQuota::new(tiers.admin.limit, tiers.admin.window))
        .with_quota(
            UserTier::Premium,
            TierQuota::new(tiers.premium.limit, tiers.premium.window),
        )
        .with_quota(UserTier::Basic, TierQuota::new(tiers.basic.limit, tiers.basic.window))
        .with_quota(
            UserTier::Viewer,
            TierQuota::new(tiers.viewer.limit, tiers.viewer.window),
        );

        let user_ratelimit = UserRateLimitConfig::builder()
            .quotas(quotas)
            .enabled(config.rate_limit.enabled)
            .store(Arc::clone(&store) as Arc<dyn RateLimitStore>)
            .circuit_breaker(Arc::clone(&user_breaker))
            .degradation(Arc::clone(&user_degradation))
            .build();

        let methods = config
            .cors
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.as_bytes()).map_err(|_| ConfigError::InvalidMethod(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let headers = config
            .cors
            .allowed_headers
            .iter()
            .map(|h| {
                HeaderName::try_from(h.as_str()).map_err(|e| ConfigError::InvalidValue {
                    key: "CORS_ALLOWED_HEADERS",
                    value: h.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cors = CorsConfig::builder()
            .allowed_origins(config.cors.allowed_origins.clone())
            .allowed_methods(methods)
            .allowed_headers(headers)
            .max_age_secs(config.cors.max_age_secs)
            .build();

        let csp_settings = config.csp;
        let csp = build_csp(csp_settings, CspDirectives::strict(), Vec::new());

        Ok(Self {
            cors,
            csp,
            ip_ratelimit,
            user_ratelimit,
            store,
            ip_breaker,
            user_breaker,
            ip_degradation,
            user_degradation,
            cleanup_interval: config.rate_limit.cleanup_interval,
            csp_settings,
        })
    }

    /// Replaces the CSP policy set, keeping the configured
    /// enabled/report-only switches.
    pub fn with_csp_policies(
        mut self,
        default_policy: CspDirectives,
        path_policies: impl IntoIterator<Item = (String, CspDirectives)>,
    ) -> Self {
        self.csp = build_csp(
            self.csp_settings,
            default_policy,
            path_policies.into_iter().collect(),
        );
        self
    }

    /// One cleanup pass: expired store entries and stale skew records.
    /// Call on a timer owned by the application, every
    /// [`EdgeGuard::cleanup_interval`].
    pub fn run_cleanup(&self, window: Duration, now: std::time::SystemTime) {
        if let Some(cutoff) = now.checked_sub(window) {
            if let Err(error) = self.store.cleanup(cutoff) {
                tracing::warn!(%error, "store cleanup failed");
            }
        }
        self.ip_ratelimit.cleanup_skew(window);
        self.user_ratelimit.cleanup_skew(window);
    }

    /// Forwards a store memory-pressure signal to both degradation
    /// managers; wire this to whatever watches the store's
    /// `memory_usage` estimate.
    pub fn on_memory_pressure_high(&self) {
        self.ip_degradation.on_memory_pressure_high();
        self.user_degradation.on_memory_pressure_high();
    }

    /// Clears the memory-pressure flag on both degradation managers.
    pub fn on_memory_pressure_normal(&self) {
        self.ip_degradation.on_memory_pressure_normal();
        self.user_degradation.on_memory_pressure_normal();
    }
}

fn breaker_pair(
    config: &EdgeConfig,
    name: &str,
) -> (Arc<CircuitBreaker>, Arc<DegradationManager>) {
    let degradation = Arc::new(DegradationManager::builder().name(name).build());
    let on_open = Arc::clone(&degradation);
    let on_close = Arc::clone(&degradation);
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(config.breaker.failure_threshold)
            .recovery_timeout(config.breaker.recovery_timeout)
            .name(name)
            .on_open(move || on_open.on_circuit_open())
            .on_close(move || on_close.on_circuit_close())
            .build(),
    );
    (breaker, degradation)
}

fn build_csp(
    settings: CspSettings,
    default_policy: CspDirectives,
    path_policies: Vec<(String, CspDirectives)>,
) -> CspLayer {
    let mut builder = CspConfig::builder()
        .enabled(settings.enabled)
        .report_only(settings.report_only)
        .default_policy(default_policy);
    for (prefix, policy) in path_policies {
        builder = builder.path_policy(prefix, policy);
    }
    builder.build()
}
