use crate::layer::CorsLayer;
use crate::validator::{OriginValidator, WhitelistValidator};
use http::{HeaderName, HeaderValue, Method};
use std::sync::Arc;

/// Configuration for the CORS middleware.
pub struct CorsConfig {
    pub(crate) validator: Arc<dyn OriginValidator>,
    pub(crate) allow_credentials: bool,
    /// Comma+space joined method list for preflight responses.
    pub(crate) methods_value: Option<HeaderValue>,
    /// Comma+space joined header list for preflight responses.
    pub(crate) headers_value: Option<HeaderValue>,
    pub(crate) max_age_value: HeaderValue,
}

impl CorsConfig {
    /// Starts building a CORS layer.
    pub fn builder() -> CorsConfigBuilder {
        CorsConfigBuilder::new()
    }
}

/// Builder for [`CorsConfig`].
pub struct CorsConfigBuilder {
    validator: Option<Arc<dyn OriginValidator>>,
    allowed_origins: Vec<String>,
    allowed_methods: Vec<Method>,
    allowed_headers: Vec<HeaderName>,
    allow_credentials: bool,
    max_age_secs: u64,
}

impl Default for CorsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - methods: GET, POST, PUT, DELETE, OPTIONS
    /// - headers: `content-type`, `authorization`
    /// - credentials allowed, preflight cached for one hour
    /// - an empty whitelist (every cross-origin request is rejected
    ///   until origins are configured)
    pub fn new() -> Self {
        Self {
            validator: None,
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![
                http::header::CONTENT_TYPE,
                http::header::AUTHORIZATION,
            ],
            allow_credentials: true,
            max_age_secs: 3_600,
        }
    }

    /// Adds origins to the default whitelist validator. Ignored when a
    /// custom validator is injected.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins
            .extend(origins.into_iter().map(Into::into));
        self
    }

    /// Replaces the origin validator entirely.
    pub fn validator(mut self, validator: Arc<dyn OriginValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Sets the methods advertised on preflight responses.
    pub fn allowed_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.allowed_methods = methods.into_iter().collect();
        self
    }

    /// Sets the request headers advertised on preflight responses.
    pub fn allowed_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = HeaderName>,
    {
        self.allowed_headers = headers.into_iter().collect();
        self
    }

    /// Whether allowed responses carry
    /// `Access-Control-Allow-Credentials: true`.
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// How long browsers may cache a preflight verdict, in seconds.
    pub fn max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Builds the layer.
    pub fn build(self) -> CorsLayer {
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(WhitelistValidator::new(self.allowed_origins)));

        let methods_value = join_header_value(self.allowed_methods.iter().map(Method::as_str));
        let headers_value = join_header_value(self.allowed_headers.iter().map(HeaderName::as_str));

        CorsLayer::new(CorsConfig {
            validator,
            allow_credentials: self.allow_credentials,
            methods_value,
            headers_value,
            max_age_value: HeaderValue::from(self.max_age_secs),
        })
    }
}

/// Joins valid header tokens with `", "`. Tokens come from `Method` and
/// `HeaderName`, so the joined string is always a valid header value;
/// an empty list yields `None` and the header is not emitted.
fn join_header_value<'a>(parts: impl Iterator<Item = &'a str>) -> Option<HeaderValue> {
    let joined = parts.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        None
    } else {
        HeaderValue::from_str(&joined).ok()
    }
}
