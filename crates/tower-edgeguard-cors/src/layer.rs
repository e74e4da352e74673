use crate::config::CorsConfig;
use crate::Cors;
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] enforcing the CORS policy.
///
/// # Examples
///
/// ```
/// use tower_edgeguard_cors::CorsConfig;
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
/// let cors = CorsConfig::builder()
///     .allowed_origins(["https://app.example"])
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(cors)
///     .service(my_service());
/// ```
#[derive(Clone)]
pub struct CorsLayer {
    config: Arc<CorsConfig>,
}

impl CorsLayer {
    pub(crate) fn new(config: CorsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = Cors<S>;

    fn layer(&self, service: S) -> Self::Service {
        Cors::new(service, Arc::clone(&self.config))
    }
}
