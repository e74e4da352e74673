use crate::config::CspConfig;
use crate::Csp;
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] stamping Content-Security-Policy headers.
///
/// # Examples
///
/// ```
/// use tower_edgeguard_csp::{CspConfig, CspDirectives};
/// use tower::ServiceBuilder;
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
/// let csp = CspConfig::builder()
///     .default_policy(CspDirectives::strict())
///     .path_policy(
///         "/embed/",
///         CspDirectives::new().directive("frame-ancestors", ["'self'"]),
///     )
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(csp)
///     .service(my_service());
/// ```
#[derive(Clone)]
pub struct CspLayer {
    config: Arc<CspConfig>,
}

impl CspLayer {
    pub(crate) fn new(config: CspConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for CspLayer {
    type Service = Csp<S>;

    fn layer(&self, service: S) -> Self::Service {
        Csp::new(service, Arc::clone(&self.config))
    }
}
