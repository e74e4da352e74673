use crate::config::{IpRateLimitConfig, UserRateLimitConfig};
use crate::service::{IpRateLimit, LimiterCore, UserRateLimit};
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;

/// A Tower [`Layer`] applying per-client-IP rate limiting.
///
/// # Examples
///
/// ```
/// use tower_edgeguard_ratelimit::IpRateLimitConfig;
/// use tower::ServiceBuilder;
/// use std::time::Duration;
///
/// # fn my_service() -> impl tower::Service<
/// #     http::Request<String>,
/// #     Response = http::Response<String>,
/// #     Error = std::convert::Infallible,
/// # > + Clone {
/// #     tower::service_fn(|_req: http::Request<String>| async {
/// #         Ok(http::Response::new(String::new()))
/// #     })
/// # }
/// let layer = IpRateLimitConfig::builder()
///     .limit(100)
///     .window(Duration::from_secs(60))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(my_service());
/// ```
#[derive(Clone)]
pub struct IpRateLimitLayer {
    config: Arc<IpRateLimitConfig>,
    core: Arc<LimiterCore>,
}

impl IpRateLimitLayer {
    /// Creates a layer from a finished config. Every service produced
    /// by this layer shares one window, breaker, and degradation
    /// manager.
    pub(crate) fn new(config: IpRateLimitConfig) -> Self {
        let core = Arc::new(LimiterCore::new(
            config.name.clone(),
            Arc::clone(&config.store),
            Arc::clone(&config.clock),
            Arc::clone(&config.breaker),
            Arc::clone(&config.degradation),
            config.events.clone(),
        ));
        Self {
            config: Arc::new(config),
            core,
        }
    }

    /// Prunes clock-skew records older than `max_age`; call from the
    /// same periodic trigger that drives store cleanup.
    pub fn cleanup_skew(&self, max_age: Duration) {
        self.core.cleanup_skew(max_age);
    }
}

impl<S> Layer<S> for IpRateLimitLayer {
    type Service = IpRateLimit<S>;

    fn layer(&self, service: S) -> Self::Service {
        IpRateLimit::new(service, Arc::clone(&self.config), Arc::clone(&self.core))
    }
}

/// A Tower [`Layer`] applying per-user rate limiting with tiered
/// quotas.
#[derive(Clone)]
pub struct UserRateLimitLayer {
    config: Arc<UserRateLimitConfig>,
    core: Arc<LimiterCore>,
}

impl UserRateLimitLayer {
    pub(crate) fn new(config: UserRateLimitConfig) -> Self {
        let core = Arc::new(LimiterCore::new(
            config.name.clone(),
            Arc::clone(&config.store),
            Arc::clone(&config.clock),
            Arc::clone(&config.breaker),
            Arc::clone(&config.degradation),
            config.events.clone(),
        ));
        Self {
            config: Arc::new(config),
            core,
        }
    }

    /// Prunes clock-skew records older than `max_age`.
    pub fn cleanup_skew(&self, max_age: Duration) {
        self.core.cleanup_skew(max_age);
    }
}

impl<S> Layer<S> for UserRateLimitLayer {
    type Service = UserRateLimit<S>;

    fn layer(&self, service: S) -> Self::Service {
        UserRateLimit::new(service, Arc::clone(&self.config), Arc::clone(&self.core))
    }
}
