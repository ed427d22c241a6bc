//! External collaborators: identity, backend profile store, purchase ledger
//!
//! The core consumes these through narrow traits so resolution, sync and
//! metering stay testable without network access. Thin reqwest-backed
//! implementations live in `profile` and `ledger`.

mod ledger;
mod profile;

pub use ledger::HttpPurchaseLedger;
pub use profile::HttpProfileStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entitlement::types::{AiUsageRecord, LedgerSnapshot, Platform, Tier, UserProfile};
use crate::error::{BackendError, PurchaseError};

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Supplies the current user and their bearer token. All storage is keyed
/// by the user id this trait reports.
pub trait Identity: Send + Sync {
    /// Currently signed-in user, if any.
    fn current_user(&self) -> Option<AuthedUser>;

    /// Bearer token attached to AI endpoint calls.
    fn auth_token(&self) -> Option<String>;
}

/// Partial update of the backend profile document. Only set fields are
/// serialized, so a merge never clobbers unrelated fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_will_renew: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_usage: Option<AiUsageRecord>,
}

/// Backend-owned profile document store: point reads and partial merges.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for a user. `Ok(None)` means no document exists.
    async fn fetch(&self, user_id: &str) -> Result<Option<UserProfile>, BackendError>;

    /// Merge a partial update onto the existing profile.
    async fn merge(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), BackendError>;
}

/// Third-party purchase ledger: current entitlements plus purchase and
/// restore operations that return a refreshed snapshot.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Current entitlements for a user.
    async fn entitlements(&self, user_id: &str) -> Result<LedgerSnapshot, BackendError>;

    /// Purchase a package and return the refreshed snapshot.
    async fn purchase(
        &self,
        user_id: &str,
        package_id: &str,
    ) -> Result<LedgerSnapshot, PurchaseError>;

    /// Restore prior purchases and return the refreshed snapshot.
    async fn restore(&self, user_id: &str) -> Result<LedgerSnapshot, PurchaseError>;
}
