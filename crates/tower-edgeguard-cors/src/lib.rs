//! CORS policy enforcement for Tower HTTP services.
//!
//! Same-origin requests (no `Origin` header) pass through untouched. A
//! disallowed origin also passes through, but with no CORS headers —
//! the browser does the blocking, the server just declines to vouch.
//! Allowed origins are echoed back, and `OPTIONS` preflights are
//! answered directly with `204 No Content` without invoking the
//! downstream handler.
//!
//! The [`OriginValidator`] trait is the policy seam; the bundled
//! [`WhitelistValidator`] is a normalized, case-insensitive whitelist.

mod config;
mod layer;
mod validator;

pub use config::{CorsConfig, CorsConfigBuilder};
pub use layer::CorsLayer;
pub use validator::{OriginValidator, WhitelistValidator};

use futures::future::BoxFuture;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower [`Service`] enforcing the CORS policy.
pub struct Cors<S> {
    inner: S,
    config: Arc<CorsConfig>,
}

impl<S> Cors<S> {
    pub(crate) fn new(inner: S, config: Arc<CorsConfig>) -> Self {
        Self { inner, config }
    }
}

impl<S: Clone> Clone for Cors<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, ReqB, ResB> Service<Request<ReqB>> for Cors<S>
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqB: Send + 'static,
    ResB: Default + Send + 'static,
{
    type Response = Response<ResB>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqB>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Same-origin traffic carries no Origin header.
            let Some(origin) = req.headers().get(header::ORIGIN).cloned() else {
                return inner.call(req).await;
            };

            let allowed = origin
                .to_str()
                .map(|o| config.validator.is_allowed(o))
                .unwrap_or(false);
            if !allowed {
                tracing::warn!(origin = ?origin, "origin not allowed; no CORS headers emitted");

                #[cfg(feature = "metrics")]
                metrics::counter!("edgeguard_cors_rejections_total").increment(1);

                // The browser enforces the denial; the response itself
                // is unchanged.
                return inner.call(req).await;
            }

            if req.method() == Method::OPTIONS {
                tracing::debug!(
                    origin = ?origin,
                    requested_method =
                        ?req.headers().get(header::ACCESS_CONTROL_REQUEST_METHOD),
                    requested_headers =
                        ?req.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS),
                    "answering CORS preflight"
                );
                return Ok(preflight_response(&config, origin));
            }

            let mut response = inner.call(req).await?;
            apply_origin_headers(&config, origin, response.headers_mut());
            Ok(response)
        })
    }
}

fn apply_origin_headers(config: &CorsConfig, origin: HeaderValue, headers: &mut http::HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    if config.allow_credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// The preflight short-circuit: 204 with the full policy, downstream
/// handler never invoked.
fn preflight_response<ResB: Default>(config: &CorsConfig, origin: HeaderValue) -> Response<ResB> {
    let mut response = Response::new(ResB::default());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    if let Some(methods) = &config.methods_value {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
    }
    if let Some(allowed) = &config.headers_value {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        config.max_age_value.clone(),
    );
    apply_origin_headers(config, origin, headers);
    response
}
