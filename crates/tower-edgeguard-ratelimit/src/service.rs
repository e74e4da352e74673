//! The per-request flow shared by the IP and user limiters.
//!
//! Everything below the middleware boundary that can recover does:
//! extraction failures, store faults, and an open circuit all log,
//! skip the check, and let the request through. Only a completed
//! denial short-circuits, as a structured 429.

use crate::config::{IpRateLimitConfig, UserRateLimitConfig};
use crate::decision::{LimiterType, RateLimitDecision};
use crate::events::{BypassReason, RateLimitEvent};
use crate::extract::PeerAddr;
use crate::user::{hashed_user_key, AnonymousPolicy, AuthenticatedUser, UserTier};
use crate::window::SlidingWindow;
use futures::future::BoxFuture;
use http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::Service;
use tower_edgeguard_breaker::{BreakerOutcome, CircuitBreaker, DegradationManager};
use tower_edgeguard_core::{Clock, EventSink};

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
static X_RATELIMIT_TYPE: HeaderName = HeaderName::from_static("x-ratelimit-type");

/// Result of one orchestrated check: either a real decision or a
/// deliberate pass-through. No nullable decisions anywhere.
pub(crate) enum Verdict {
    Decision(RateLimitDecision),
    Bypassed(BypassReason),
}

/// Window + breaker + degradation orchestration shared by both
/// limiter variants.
pub(crate) struct LimiterCore {
    name: String,
    window: SlidingWindow,
    breaker: Arc<CircuitBreaker>,
    degradation: Arc<DegradationManager>,
    events: EventSink<RateLimitEvent>,
}

impl LimiterCore {
    pub(crate) fn new(
        name: String,
        store: Arc<dyn crate::store::RateLimitStore>,
        clock: Arc<dyn Clock>,
        breaker: Arc<CircuitBreaker>,
        degradation: Arc<DegradationManager>,
        events: EventSink<RateLimitEvent>,
    ) -> Self {
        let window = SlidingWindow::with_observability(store, clock, name.clone(), events.clone());
        Self {
            name,
            window,
            breaker,
            degradation,
            events,
        }
    }

    pub(crate) fn check(
        &self,
        key: &str,
        base_limit: usize,
        window: Duration,
        limiter: LimiterType,
    ) -> Verdict {
        let limit = self.degradation.adjust_limits(base_limit);
        if limit == 0 {
            tracing::debug!(limiter = %self.name, "rate limiting disabled by degradation");
            return self.bypass(limiter, BypassReason::DegradationDisabled);
        }

        if self.breaker.is_open() {
            return self.bypass(limiter, BypassReason::CircuitOpen);
        }

        let started = Instant::now();
        let result = self
            .breaker
            .execute(|| self.window.check(key, limit, window, limiter));

        #[cfg(feature = "metrics")]
        metrics::histogram!(
            "edgeguard_ratelimit_check_duration_seconds",
            "limiter" => limiter.as_str()
        )
        .record(started.elapsed().as_secs_f64());
        #[cfg(not(feature = "metrics"))]
        let _ = started;

        match result {
            Ok(BreakerOutcome::Executed(decision)) => {
                if decision.allowed {
                    self.events.publish(&RateLimitEvent::RequestAllowed {
                        name: self.name.clone(),
                        key: decision.key.clone(),
                        limiter,
                        remaining: decision.remaining,
                    });
                } else {
                    tracing::warn!(
                        limiter = %self.name,
                        key = %decision.key,
                        retry_after_secs = decision.retry_after_secs(),
                        "rate limit exceeded"
                    );
                    self.events.publish(&RateLimitEvent::RequestDenied {
                        name: self.name.clone(),
                        key: decision.key.clone(),
                        limiter,
                        retry_after: decision.retry_after,
                    });
                }
                Verdict::Decision(decision)
            }
            Ok(BreakerOutcome::Bypassed) => self.bypass(limiter, BypassReason::CircuitOpen),
            Err(error) => {
                tracing::error!(
                    limiter = %self.name,
                    %error,
                    "rate-limit check failed; allowing request"
                );
                self.bypass(limiter, BypassReason::LimiterFault)
            }
        }
    }

    pub(crate) fn bypass(&self, limiter: LimiterType, reason: BypassReason) -> Verdict {
        self.events.publish(&RateLimitEvent::CheckBypassed {
            name: self.name.clone(),
            limiter,
            reason,
        });

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "edgeguard_ratelimit_bypassed_total",
            "limiter" => limiter.as_str(),
            "reason" => reason.as_str()
        )
        .increment(1);

        Verdict::Bypassed(reason)
    }

    pub(crate) fn cleanup_skew(&self, max_age: Duration) {
        self.window.cleanup_skew(max_age);
    }
}

/// Stamps the rate-limit response headers; emitted on every response
/// that completed a check, allowed or not.
fn stamp_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(&X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit as u64));
    headers.insert(
        &X_RATELIMIT_REMAINING,
        HeaderValue::from(decision.remaining as u64),
    );
    headers.insert(
        &X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_unix_secs()),
    );
    headers.insert(
        &X_RATELIMIT_TYPE,
        HeaderValue::from_static(decision.limiter.as_str()),
    );
}

/// Builds the structured 429 short-circuit response.
fn too_many_requests<ResB>(decision: &RateLimitDecision) -> Response<ResB>
where
    ResB: From<String>,
{
    let body = serde_json::json!({
        "error": "rate_limit_exceeded",
        "message": format!(
            "rate limit of {} requests per {}s exceeded; retry in {}s",
            decision.limit,
            decision.window.as_secs(),
            decision.retry_after_secs()
        ),
        "retry_after": decision.retry_after_secs(),
        "limit": decision.limit,
        "window": format!("{}s", decision.window.as_secs()),
    })
    .to_string();

    let mut response = Response::new(ResB::from(body));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after_secs()),
    );
    stamp_rate_limit_headers(response.headers_mut(), decision);
    response
}

#[cfg(feature = "metrics")]
fn record_outcome(decision: &RateLimitDecision, path: &str) {
    metrics::counter!(
        "edgeguard_ratelimit_requests_total",
        "limiter" => decision.limiter.as_str(),
        "outcome" => if decision.allowed { "allowed" } else { "denied" },
        "path" => path.to_string()
    )
    .increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_outcome(_decision: &RateLimitDecision, _path: &str) {}

/// A Tower [`Service`] that rate limits by client IP.
pub struct IpRateLimit<S> {
    inner: S,
    config: Arc<IpRateLimitConfig>,
    core: Arc<LimiterCore>,
}

impl<S> IpRateLimit<S> {
    pub(crate) fn new(inner: S, config: Arc<IpRateLimitConfig>, core: Arc<LimiterCore>) -> Self {
        Self {
            inner,
            config,
            core,
        }
    }
}

impl<S: Clone> Clone for IpRateLimit<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            core: Arc::clone(&self.core),
        }
    }
}

impl<S, ReqB, ResB> Service<Request<ReqB>> for IpRateLimit<S>
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqB: Send + 'static,
    ResB: Default + From<String> + Send + 'static,
{
    type Response = Response<ResB>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqB>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let core = Arc::clone(&self.core);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !config.enabled {
                return inner.call(req).await;
            }

            let peer = req.extensions().get::<PeerAddr>().map(|p| p.0);
            let key = match config.extractor.client_ip(peer, req.headers()) {
                Ok(ip) => ip.to_string(),
                Err(error) => {
                    tracing::warn!(%error, "client key extraction failed; allowing request");
                    core.bypass(IpRateLimitConfig::LIMITER, BypassReason::ExtractionFailed);
                    return inner.call(req).await;
                }
            };

            match core.check(
                &key,
                config.limit,
                config.window,
                IpRateLimitConfig::LIMITER,
            ) {
                Verdict::Bypassed(_) => inner.call(req).await,
                Verdict::Decision(decision) if decision.allowed => {
                    record_outcome(&decision, req.uri().path());
                    let mut response = inner.call(req).await?;
                    stamp_rate_limit_headers(response.headers_mut(), &decision);
                    Ok(response)
                }
                Verdict::Decision(decision) => {
                    record_outcome(&decision, req.uri().path());
                    Ok(too_many_requests(&decision))
                }
            }
        })
    }
}

/// A Tower [`Service`] that rate limits by authenticated user, with
/// tiered quotas.
pub struct UserRateLimit<S> {
    inner: S,
    config: Arc<UserRateLimitConfig>,
    core: Arc<LimiterCore>,
}

impl<S> UserRateLimit<S> {
    pub(crate) fn new(inner: S, config: Arc<UserRateLimitConfig>, core: Arc<LimiterCore>) -> Self {
        Self {
            inner,
            config,
            core,
        }
    }
}

impl<S: Clone> Clone for UserRateLimit<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            core: Arc::clone(&self.core),
        }
    }
}

impl<S, ReqB, ResB> Service<Request<ReqB>> for UserRateLimit<S>
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqB: Send + 'static,
    ResB: Default + From<String> + Send + 'static,
{
    type Response = Response<ResB>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqB>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let core = Arc::clone(&self.core);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !config.enabled {
                return inner.call(req).await;
            }

            let user = req.extensions().get::<AuthenticatedUser>().cloned();
            let (key, quota) = match user {
                Some(user) => {
                    let tier = user
                        .tier
                        .unwrap_or_else(|| config.tier_provider.tier(&user.id));
                    (hashed_user_key(&user.id), config.quotas.quota_for(tier))
                }
                None => match config.anonymous {
                    AnonymousPolicy::Skip => {
                        core.bypass(UserRateLimitConfig::LIMITER, BypassReason::Unauthenticated);
                        return inner.call(req).await;
                    }
                    AnonymousPolicy::Require => {
                        tracing::warn!(
                            limiter = %config.name,
                            "user identity required but absent; allowing request"
                        );
                        core.bypass(UserRateLimitConfig::LIMITER, BypassReason::Unauthenticated);
                        return inner.call(req).await;
                    }
                    AnonymousPolicy::LimitAsAnonymous => (
                        hashed_user_key("anonymous"),
                        config.quotas.quota_for(UserTier::Basic),
                    ),
                },
            };

            match core.check(&key, quota.limit, quota.window, UserRateLimitConfig::LIMITER) {
                Verdict::Bypassed(_) => inner.call(req).await,
                Verdict::Decision(decision) if decision.allowed => {
                    record_outcome(&decision, req.uri().path());
                    let mut response = inner.call(req).await?;
                    stamp_rate_limit_headers(response.headers_mut(), &decision);
                    Ok(response)
                }
                Verdict::Decision(decision) => {
                    record_outcome(&decision, req.uri().path());
                    Ok(too_many_requests(&decision))
                }
            }
        })
    }
}
