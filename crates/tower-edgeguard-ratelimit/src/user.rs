//! User identity, tier quotas, and the anonymous-traffic policy.
//!
//! Identity is consumed, never established: an upstream authenticator
//! inserts [`AuthenticatedUser`] as a request extension. User IDs are
//! digested before they become store keys, so the store never holds
//! plaintext identities.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

/// Authenticated identity set by an upstream component as a request
/// extension. `tier` is optional: when the authenticator already knows
/// it, the [`TierProvider`] is not consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub tier: Option<UserTier>,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tier: None,
        }
    }

    pub fn with_tier(id: impl Into<String>, tier: UserTier) -> Self {
        Self {
            id: id.into(),
            tier: Some(tier),
        }
    }
}

/// Quota tiers, most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserTier {
    Admin,
    Premium,
    Basic,
    Viewer,
}

impl UserTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Admin => "admin",
            UserTier::Premium => "premium",
            UserTier::Basic => "basic",
            UserTier::Viewer => "viewer",
        }
    }
}

/// Maps a user ID to a tier.
pub trait TierProvider: Send + Sync {
    fn tier(&self, user_id: &str) -> UserTier;
}

/// The default provider: every user is `Basic`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTierProvider;

impl TierProvider for BasicTierProvider {
    fn tier(&self, _user_id: &str) -> UserTier {
        UserTier::Basic
    }
}

/// A `(limit, window)` pair for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierQuota {
    pub limit: usize,
    pub window: Duration,
}

impl TierQuota {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Tier-specific quotas with a default fallback for unmapped tiers.
#[derive(Debug, Clone)]
pub struct TierQuotas {
    quotas: HashMap<UserTier, TierQuota>,
    fallback: TierQuota,
}

impl TierQuotas {
    /// Creates an empty table; every tier resolves to `fallback`.
    pub fn new(fallback: TierQuota) -> Self {
        Self {
            quotas: HashMap::new(),
            fallback,
        }
    }

    /// Sets the quota for one tier.
    pub fn with_quota(mut self, tier: UserTier, quota: TierQuota) -> Self {
        self.quotas.insert(tier, quota);
        self
    }

    pub fn quota_for(&self, tier: UserTier) -> TierQuota {
        self.quotas.get(&tier).copied().unwrap_or(self.fallback)
    }
}

impl Default for TierQuotas {
    fn default() -> Self {
        let minute = Duration::from_secs(60);
        Self::new(TierQuota::new(100, minute))
            .with_quota(UserTier::Admin, TierQuota::new(1_000, minute))
            .with_quota(UserTier::Premium, TierQuota::new(500, minute))
            .with_quota(UserTier::Basic, TierQuota::new(100, minute))
            .with_quota(UserTier::Viewer, TierQuota::new(20, minute))
    }
}

/// What the user limiter does with unauthenticated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnonymousPolicy {
    /// Let unauthenticated traffic through unchecked.
    Skip,
    /// Count all unauthenticated traffic against one synthetic subject
    /// at Basic tier.
    #[default]
    LimitAsAnonymous,
    /// Identity is expected here; its absence is logged and the request
    /// passes unchecked (this middleware cannot authenticate anyone).
    Require,
}

/// SHA-256 hex digest of a user identifier; the only form that ever
/// reaches the store.
pub fn hashed_user_key(user_id: &str) -> String {
    hex::encode(Sha256::digest(user_id.as_bytes()))
}
