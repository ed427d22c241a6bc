//! Tier synchronization to the backend profile
//!
//! Reconciles the purchase ledger's view of the tier with the
//! backend-authoritative profile after every purchase, restore, and app
//! foreground. Always best-effort: failures go to the log sink and never
//! block the flow that triggered the sync.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{ProfilePatch, ProfileStore, PurchaseLedger};
use crate::log_sink::LogSink;

use super::types::{LedgerSnapshot, Tier, UserProfile};

const SYNC_CONTEXT: &str = "tier sync";

/// Write the reconciled tier back to the profile as a partial merge.
///
/// Override-protected profiles (manual override or alpha/beta code) are
/// never downgraded: the written tier is the max of profile, override and
/// ledger tiers. Otherwise the ledger is authoritative and its fields are
/// written directly.
pub async fn sync_tier(
    profiles: &dyn ProfileStore,
    sink: &dyn LogSink,
    user_id: &str,
    snapshot: &LedgerSnapshot,
) {
    let profile = match profiles.fetch(user_id).await {
        Ok(profile) => profile.unwrap_or_default(),
        Err(e) => {
            sink.failure(SYNC_CONTEXT, &e.to_string());
            return;
        }
    };

    let patch = reconcile(&profile, snapshot);
    match profiles.merge(user_id, &patch).await {
        Ok(()) => debug!(
            user = user_id,
            tier = ?patch.subscription_tier,
            "synced tier to profile"
        ),
        Err(e) => sink.failure(SYNC_CONTEXT, &e.to_string()),
    }
}

/// Pure reconciliation of profile and ledger into the patch to write.
fn reconcile(profile: &UserProfile, snapshot: &LedgerSnapshot) -> ProfilePatch {
    let ledger_tier = snapshot.active_tier().unwrap_or(Tier::Free);

    if profile.is_override_protected() {
        // A stale ledger read (e.g. no purchase on file) must never
        // downgrade a manually-granted or beta account.
        let effective = profile
            .subscription_tier
            .unwrap_or(Tier::Free)
            .max(profile.tier_override.unwrap_or(Tier::Free))
            .max(ledger_tier);
        return ProfilePatch {
            subscription_tier: Some(effective),
            subscription_status: Some("active".to_string()),
            ..ProfilePatch::default()
        };
    }

    match snapshot.active_entitlement() {
        Some(entitlement) => ProfilePatch {
            subscription_tier: Some(entitlement.tier),
            subscription_status: Some("active".to_string()),
            subscription_platform: entitlement.platform,
            subscription_expires_at: entitlement.expiration_date,
            subscription_will_renew: Some(entitlement.will_renew),
            ..ProfilePatch::default()
        },
        None => ProfilePatch {
            subscription_tier: Some(Tier::Free),
            subscription_status: Some("active".to_string()),
            subscription_will_renew: Some(false),
            ..ProfilePatch::default()
        },
    }
}

/// Fire-and-forget sync: a detached task whose failures are captured into
/// the sink. The returned handle is dropped by production callers; tests
/// may await it.
pub fn spawn_sync(
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn PurchaseLedger>,
    sink: Arc<dyn LogSink>,
    user_id: String,
    snapshot: Option<LedgerSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => match ledger.entitlements(&user_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    sink.failure(SYNC_CONTEXT, &e.to_string());
                    return;
                }
            },
        };
        sync_tier(profiles.as_ref(), sink.as_ref(), &user_id, &snapshot).await;
    })
}
