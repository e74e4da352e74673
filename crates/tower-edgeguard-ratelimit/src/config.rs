use crate::decision::LimiterType;
use crate::events::{BypassReason, RateLimitEvent};
use crate::extract::{ClientIpExtractor, DirectIpExtractor};
use crate::layer::{IpRateLimitLayer, UserRateLimitLayer};
use crate::store::{MemoryStore, RateLimitStore};
use crate::user::{AnonymousPolicy, BasicTierProvider, TierProvider, TierQuotas};
use std::sync::Arc;
use std::time::Duration;
use tower_edgeguard_breaker::{CircuitBreaker, DegradationManager};
use tower_edgeguard_core::{Clock, EventSink, SystemClock};

/// Configuration for the per-IP rate limiter.
pub struct IpRateLimitConfig {
    pub(crate) limit: usize,
    pub(crate) window: Duration,
    pub(crate) enabled: bool,
    pub(crate) name: String,
    pub(crate) store: Arc<dyn RateLimitStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) extractor: Arc<dyn ClientIpExtractor>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) degradation: Arc<DegradationManager>,
    pub(crate) events: EventSink<RateLimitEvent>,
}

impl IpRateLimitConfig {
    /// Starts building an IP rate-limit layer.
    pub fn builder() -> IpRateLimitConfigBuilder {
        IpRateLimitConfigBuilder::new()
    }
}

/// Builder for [`IpRateLimitConfig`].
pub struct IpRateLimitConfigBuilder {
    limit: usize,
    window: Duration,
    enabled: bool,
    name: String,
    store: Option<Arc<dyn RateLimitStore>>,
    clock: Arc<dyn Clock>,
    extractor: Arc<dyn ClientIpExtractor>,
    breaker: Option<Arc<CircuitBreaker>>,
    degradation: Option<Arc<DegradationManager>>,
    events: EventSink<RateLimitEvent>,
}

impl Default for IpRateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IpRateLimitConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - limit: 100 requests per window
    /// - window: 60 seconds
    /// - enabled, direct (header-free) IP extraction
    /// - a fresh in-memory store bounded to 10,000 keys
    /// - a breaker and degradation manager named after the limiter
    pub fn new() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
            enabled: true,
            name: "ip-ratelimit".to_string(),
            store: None,
            clock: Arc::new(SystemClock),
            extractor: Arc::new(DirectIpExtractor),
            breaker: None,
            degradation: None,
            events: EventSink::new(),
        }
    }

    /// Maximum requests per window for one client IP.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Length of the sliding window.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Globally enables or disables the limiter; when disabled every
    /// request passes untouched.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the name for this limiter instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Injects the store; share one `Arc` between the IP and user
    /// limiters to bound total memory together.
    pub fn store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the clock. Tests use this to drive window timing.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Swaps in a different client-IP extractor, e.g.
    /// [`crate::TrustedProxyIpExtractor`] behind a reverse proxy.
    pub fn extractor(mut self, extractor: Arc<dyn ClientIpExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Injects the circuit breaker guarding store calls.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Injects the degradation manager scaling effective limits.
    pub fn degradation(mut self, degradation: Arc<DegradationManager>) -> Self {
        self.degradation = Some(degradation);
        self
    }

    /// Registers a callback for every allowed decision, with the
    /// remaining quota.
    pub fn on_allowed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let RateLimitEvent::RequestAllowed { remaining, .. } = event {
                f(*remaining);
            }
        });
        self
    }

    /// Registers a callback for every denied decision, with the
    /// retry-after duration.
    pub fn on_denied<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let RateLimitEvent::RequestDenied { retry_after, .. } = event {
                f(*retry_after);
            }
        });
        self
    }

    /// Registers a callback for every bypassed check.
    pub fn on_bypassed<F>(mut self, f: F) -> Self
    where
        F: Fn(BypassReason) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let RateLimitEvent::CheckBypassed { reason, .. } = event {
                f(*reason);
            }
        });
        self
    }

    /// Builds the layer.
    pub fn build(self) -> IpRateLimitLayer {
        let name = self.name;
        let breaker = self
            .breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::builder().name(name.clone()).build()));
        let degradation = self
            .degradation
            .unwrap_or_else(|| Arc::new(DegradationManager::builder().name(name.clone()).build()));
        IpRateLimitLayer::new(IpRateLimitConfig {
            limit: self.limit,
            window: self.window,
            enabled: self.enabled,
            name,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::default())),
            clock: self.clock,
            extractor: self.extractor,
            breaker,
            degradation,
            events: self.events,
        })
    }
}

/// Configuration for the per-user rate limiter.
pub struct UserRateLimitConfig {
    pub(crate) quotas: TierQuotas,
    pub(crate) tier_provider: Arc<dyn TierProvider>,
    pub(crate) anonymous: AnonymousPolicy,
    pub(crate) enabled: bool,
    pub(crate) name: String,
    pub(crate) store: Arc<dyn RateLimitStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) degradation: Arc<DegradationManager>,
    pub(crate) events: EventSink<RateLimitEvent>,
}

impl UserRateLimitConfig {
    /// Starts building a user rate-limit layer.
    pub fn builder() -> UserRateLimitConfigBuilder {
        UserRateLimitConfigBuilder::new()
    }
}

/// Builder for [`UserRateLimitConfig`].
pub struct UserRateLimitConfigBuilder {
    quotas: TierQuotas,
    tier_provider: Arc<dyn TierProvider>,
    anonymous: AnonymousPolicy,
    enabled: bool,
    name: String,
    store: Option<Arc<dyn RateLimitStore>>,
    clock: Arc<dyn Clock>,
    breaker: Option<Arc<CircuitBreaker>>,
    degradation: Option<Arc<DegradationManager>>,
    events: EventSink<RateLimitEvent>,
}

impl Default for UserRateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRateLimitConfigBuilder {
    /// Creates a new builder with defaults: default tier quotas,
    /// everyone mapped to Basic, anonymous traffic pooled under one
    /// synthetic subject.
    pub fn new() -> Self {
        Self {
            quotas: TierQuotas::default(),
            tier_provider: Arc::new(BasicTierProvider),
            anonymous: AnonymousPolicy::default(),
            enabled: true,
            name: "user-ratelimit".to_string(),
            store: None,
            clock: Arc::new(SystemClock),
            breaker: None,
            degradation: None,
            events: EventSink::new(),
        }
    }

    /// Sets the per-tier quota table.
    pub fn quotas(mut self, quotas: TierQuotas) -> Self {
        self.quotas = quotas;
        self
    }

    /// Injects the user-ID-to-tier mapping.
    pub fn tier_provider(mut self, provider: Arc<dyn TierProvider>) -> Self {
        self.tier_provider = provider;
        self
    }

    /// Sets what happens to unauthenticated requests.
    pub fn anonymous_policy(mut self, policy: AnonymousPolicy) -> Self {
        self.anonymous = policy;
        self
    }

    /// Globally enables or disables the limiter.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the name for this limiter instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Injects the store.
    pub fn store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Injects the circuit breaker guarding store calls.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Injects the degradation manager scaling effective limits.
    pub fn degradation(mut self, degradation: Arc<DegradationManager>) -> Self {
        self.degradation = Some(degradation);
        self
    }

    /// Registers a callback for every allowed decision.
    pub fn on_allowed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let RateLimitEvent::RequestAllowed { remaining, .. } = event {
                f(*remaining);
            }
        });
        self
    }

    /// Registers a callback for every denied decision.
    pub fn on_denied<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let RateLimitEvent::RequestDenied { retry_after, .. } = event {
                f(*retry_after);
            }
        });
        self
    }

    /// Registers a callback for every bypassed check.
    pub fn on_bypassed<F>(mut self, f: F) -> Self
    where
        F: Fn(BypassReason) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if let RateLimitEvent::CheckBypassed { reason, .. } = event {
                f(*reason);
            }
        });
        self
    }

    /// Builds the layer.
    pub fn build(self) -> UserRateLimitLayer {
        let name = self.name;
        let breaker = self
            .breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::builder().name(name.clone()).build()));
        let degradation = self
            .degradation
            .unwrap_or_else(|| Arc::new(DegradationManager::builder().name(name.clone()).build()));
        UserRateLimitLayer::new(UserRateLimitConfig {
            quotas: self.quotas,
            tier_provider: self.tier_provider,
            anonymous: self.anonymous,
            enabled: self.enabled,
            name,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::default())),
            clock: self.clock,
            breaker,
            degradation,
            events: self.events,
        })
    }
}

// The limiter type a config produces is fixed; used by the shared core
// when tagging events.
impl IpRateLimitConfig {
    pub(crate) const LIMITER: LimiterType = LimiterType::Ip;
}

impl UserRateLimitConfig {
    pub(crate) const LIMITER: LimiterType = LimiterType::User;
}
