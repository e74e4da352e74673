//! Content-Security-Policy directive sets.

use std::collections::BTreeMap;

/// An ordered set of CSP directives.
///
/// Serialization joins `directive-name source…` groups with `"; "`;
/// directives are kept in name order so the emitted header is stable.
/// An empty set serializes to an empty string and emits no header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspDirectives {
    directives: BTreeMap<String, Vec<String>>,
}

impl CspDirectives {
    pub fn new() -> Self {
        Self::default()
    }

    /// A restrictive baseline: same-origin everything, no embedding,
    /// no plugins.
    pub fn strict() -> Self {
        Self::new()
            .directive("default-src", ["'self'"])
            .directive("frame-ancestors", ["'none'"])
            .directive("object-src", ["'none'"])
            .directive("base-uri", ["'self'"])
    }

    /// Sets one directive; sources may be empty for valueless
    /// directives such as `upgrade-insecure-requests`.
    pub fn directive<N, I, S>(mut self, name: N, sources: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directives
            .insert(name.into(), sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Serializes to the header value form.
    pub fn serialize(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| {
                if sources.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", name, sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
