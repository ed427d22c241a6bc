//! Subscription entitlements
//!
//! This module handles:
//! - Tier resolution from profile, ledger and trial codes
//! - The pure tier-to-feature access policy
//! - Best-effort tier sync back to the backend profile

pub mod policy;
mod resolver;
mod sync;
pub mod types;

pub use policy::has_access;
pub use resolver::{evaluate, EntitlementResolver};
pub use sync::{spawn_sync, sync_tier};
pub use types::{
    AiUsageRecord, Feature, LedgerEntitlement, LedgerSnapshot, Platform, SubscriptionStatus,
    Tier, UserProfile,
};
