use crate::layer::CspLayer;
use crate::policy::CspDirectives;
use std::collections::BTreeMap;

/// Configuration for the CSP middleware: a default policy plus
/// path-prefix-routed overrides.
pub struct CspConfig {
    pub(crate) enabled: bool,
    pub(crate) report_only: bool,
    pub(crate) default_policy: Option<CspDirectives>,
    pub(crate) path_policies: BTreeMap<String, CspDirectives>,
}

impl CspConfig {
    /// Starts building a CSP layer.
    pub fn builder() -> CspConfigBuilder {
        CspConfigBuilder::new()
    }

    /// Longest-prefix selection over the request path, default
    /// otherwise.
    pub(crate) fn select(&self, path: &str) -> Option<&CspDirectives> {
        self.path_policies
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, policy)| policy)
            .or(self.default_policy.as_ref())
    }
}

/// Builder for [`CspConfig`].
pub struct CspConfigBuilder {
    enabled: bool,
    report_only: bool,
    default_policy: Option<CspDirectives>,
    path_policies: BTreeMap<String, CspDirectives>,
}

impl Default for CspConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CspConfigBuilder {
    /// Creates a new builder: enabled, enforcing (not report-only), no
    /// policies.
    pub fn new() -> Self {
        Self {
            enabled: true,
            report_only: false,
            default_policy: None,
            path_policies: BTreeMap::new(),
        }
    }

    /// Enables or disables the middleware entirely.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Emits `Content-Security-Policy-Report-Only` instead of the
    /// enforcing header. Never both.
    pub fn report_only(mut self, report_only: bool) -> Self {
        self.report_only = report_only;
        self
    }

    /// Sets the policy used when no path prefix matches.
    pub fn default_policy(mut self, policy: CspDirectives) -> Self {
        self.default_policy = Some(policy);
        self
    }

    /// Routes `prefix` (and everything under it) to `policy`; the
    /// longest matching prefix wins.
    pub fn path_policy(mut self, prefix: impl Into<String>, policy: CspDirectives) -> Self {
        self.path_policies.insert(prefix.into(), policy);
        self
    }

    /// Builds the layer.
    pub fn build(self) -> CspLayer {
        CspLayer::new(CspConfig {
            enabled: self.enabled,
            report_only: self.report_only,
            default_policy: self.default_policy,
            path_policies: self.path_policies,
        })
    }
}
