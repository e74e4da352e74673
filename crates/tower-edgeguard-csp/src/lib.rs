//! Content-Security-Policy emission with path-prefix routing.
//!
//! A configuration holds an optional default directive set plus a map
//! from path prefix to directive set; selection is longest-prefix
//! match. A policy that serializes to an empty string emits no header,
//! and report-only mode swaps the enforcing header for
//! `Content-Security-Policy-Report-Only` — never both at once.

mod config;
mod layer;
mod policy;

pub use config::{CspConfig, CspConfigBuilder};
pub use layer::CspLayer;
pub use policy::CspDirectives;

use futures::future::BoxFuture;
use http::header::{CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_REPORT_ONLY};
use http::{HeaderValue, Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower [`Service`] stamping Content-Security-Policy headers.
pub struct Csp<S> {
    inner: S,
    config: Arc<CspConfig>,
}

impl<S> Csp<S> {
    pub(crate) fn new(inner: S, config: Arc<CspConfig>) -> Self {
        Self { inner, config }
    }
}

impl<S: Clone> Clone for Csp<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, ReqB, ResB> Service<Request<ReqB>> for Csp<S>
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + Send + 'static,
    S::Future: Send + 'static,
    ReqB: Send + 'static,
{
    type Response = Response<ResB>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqB>) -> Self::Future {
        let config = Arc::clone(&self.config);

        // Selection happens before the handler runs; the policy is a
        // function of the request path alone.
        let header_value = if config.enabled {
            config
                .select(req.uri().path())
                .map(|policy| policy.serialize())
                .filter(|serialized| !serialized.is_empty())
                .and_then(|serialized| match HeaderValue::from_str(&serialized) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(
                            path = req.uri().path(),
                            "CSP policy serialized to an invalid header value; skipping"
                        );
                        None
                    }
                })
        } else {
            None
        };

        let future = self.inner.call(req);
        Box::pin(async move {
            let mut response = future.await?;
            if let Some(value) = header_value {
                let name = if config.report_only {
                    CONTENT_SECURITY_POLICY_REPORT_ONLY
                } else {
                    CONTENT_SECURITY_POLICY
                };
                response.headers_mut().insert(name, value);
            }
            Ok(response)
        })
    }
}
