//! Entitlement data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier
///
/// Ordered `Free < Plus < Connect`; Connect is a superset of Plus.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Plus,
    Connect,
}

impl Tier {
    /// True for the paid tiers (Plus/Connect).
    pub fn is_paid(self) -> bool {
        self != Tier::Free
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Plus => write!(f, "plus"),
            Self::Connect => write!(f, "connect"),
        }
    }
}

/// How a paid tier was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    IosStore,
    AndroidStore,
    WebBilling,
}

/// Gated features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Sms,
    Ai,
    Practitioner,
    Export,
    FileUpload,
}

/// Resolved subscription state. Transient: recomputed on every query,
/// never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub tier: Tier,
    pub is_active: bool,
    /// Present only when the tier is purchase- or trial-backed.
    pub expiration_date: Option<DateTime<Utc>>,
    pub will_renew: bool,
    pub platform: Option<Platform>,
}

impl SubscriptionStatus {
    /// Active free tier (resolution rule of last resort).
    pub fn free() -> Self {
        Self {
            tier: Tier::Free,
            is_active: true,
            expiration_date: None,
            will_renew: false,
            platform: None,
        }
    }

    /// Fail-open default returned when resolution cannot consult any
    /// authority (no signed-in user, or every source unreachable).
    pub fn fail_open() -> Self {
        Self {
            is_active: false,
            ..Self::free()
        }
    }
}

/// Subset of the backend-owned profile document the core reads and writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Last-synced tier; authoritative unless an override exists.
    #[serde(default)]
    pub subscription_tier: Option<Tier>,
    /// Administrative grant, highest priority, never downgraded by sync.
    #[serde(default)]
    pub tier_override: Option<Tier>,
    /// Marker granting a time-boxed trial ("alpha"/"beta").
    #[serde(default)]
    pub special_code: Option<String>,
    /// Trial grants Plus until this instant.
    #[serde(default)]
    pub free_trial_ends: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_status: Option<String>,
    #[serde(default)]
    pub subscription_platform: Option<Platform>,
    #[serde(default)]
    pub subscription_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_will_renew: Option<bool>,
    #[serde(default)]
    pub ai_usage: Option<AiUsageRecord>,
}

impl UserProfile {
    /// Whether the special code marks an alpha/beta grant.
    pub fn has_trial_code(&self) -> bool {
        matches!(self.special_code.as_deref(), Some("alpha") | Some("beta"))
    }

    /// Override-protected profiles are never downgraded by automated sync.
    pub fn is_override_protected(&self) -> bool {
        self.tier_override.is_some() || self.has_trial_code()
    }
}

/// Per-day AI usage counter mirrored between the local store and the
/// backend profile. `date` is a day key in the UTC-10 reference timezone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiUsageRecord {
    pub date: String,
    pub count: u32,
}

/// One named entitlement from the purchase ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntitlement {
    pub tier: Tier,
    pub is_active: bool,
    pub expiration_date: Option<DateTime<Utc>>,
    pub will_renew: bool,
    pub platform: Option<Platform>,
}

/// The purchase ledger's current view of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub entitlements: Vec<LedgerEntitlement>,
}

impl LedgerSnapshot {
    /// Highest-priority active entitlement: Connect before Plus.
    pub fn active_entitlement(&self) -> Option<&LedgerEntitlement> {
        let active = |tier: Tier| {
            self.entitlements
                .iter()
                .find(|e| e.is_active && e.tier == tier)
        };
        active(Tier::Connect).or_else(|| active(Tier::Plus))
    }

    /// Tier of the active entitlement, if any.
    pub fn active_tier(&self) -> Option<Tier> {
        self.active_entitlement().map(|e| e.tier)
    }
}
