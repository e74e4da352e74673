//! Origin validation.
//!
//! The default validator is a case-insensitive whitelist; the trait is
//! the seam for pattern or IP-range variants.

use std::collections::HashSet;

/// Decides whether a request origin may make cross-origin calls.
pub trait OriginValidator: Send + Sync {
    fn is_allowed(&self, origin: &str) -> bool;
}

/// Case-insensitive whitelist over normalized origins.
///
/// Origins are normalized at construction and again per lookup, so the
/// verdict is invariant under case, surrounding whitespace, and a
/// trailing slash.
#[derive(Debug, Clone, Default)]
pub struct WhitelistValidator {
    origins: HashSet<String>,
}

impl WhitelistValidator {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            origins: origins
                .into_iter()
                .filter_map(|origin| normalize(origin.as_ref()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl OriginValidator for WhitelistValidator {
    fn is_allowed(&self, origin: &str) -> bool {
        normalize(origin)
            .map(|origin| self.origins.contains(&origin))
            .unwrap_or(false)
    }
}

/// Lowercases, trims, strips one trailing slash; empties normalize to
/// nothing and are dropped.
fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    Some(match lowered.strip_suffix('/') {
        Some(stripped) => stripped.to_owned(),
        None => lowered,
    })
}
