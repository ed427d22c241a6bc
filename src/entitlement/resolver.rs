//! Entitlement resolution
//!
//! Determines a user's subscription tier from the backend profile, the
//! purchase ledger, or the free default. The priority cascade is an
//! ordered list of named rules, each a pure function over a snapshot of
//! the inputs, so every rule is unit-testable in isolation.
//!
//! Ordering rationale: administrative and backend-recorded grants must
//! never be overridden by a third-party ledger that may be stale,
//! unreachable, or linked to a different account. The ledger is the
//! lowest-priority source of paid-tier truth and is only fetched when no
//! profile rule matched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::backend::{ProfileStore, PurchaseLedger};

use super::types::{LedgerSnapshot, Platform, SubscriptionStatus, Tier, UserProfile};

/// One rule of the priority cascade: `Some` decides resolution, `None`
/// passes to the next rule.
type Rule = fn(
    Option<&UserProfile>,
    Option<&LedgerSnapshot>,
    DateTime<Utc>,
) -> Option<SubscriptionStatus>;

/// The cascade, highest priority first. The free fallback is not a rule;
/// `resolve` applies it when nothing here matches.
const RULES: &[(&str, Rule)] = &[
    ("tier_override", tier_override),
    ("profile_tier", profile_tier),
    ("special_code_trial", special_code_trial),
    ("special_code_grandfathered", special_code_grandfathered),
    ("ledger_entitlement", ledger_entitlement),
];

/// Rule 1: administrative override on the profile.
fn tier_override(
    profile: Option<&UserProfile>,
    _ledger: Option<&LedgerSnapshot>,
    _now: DateTime<Utc>,
) -> Option<SubscriptionStatus> {
    let tier = profile?.tier_override.filter(|t| t.is_paid())?;
    Some(SubscriptionStatus {
        tier,
        is_active: true,
        expiration_date: None,
        will_renew: false,
        platform: Some(Platform::WebBilling),
    })
}

/// Rule 2: backend-recorded paid tier. Presence of the tier value is
/// itself treated as active; the profile's status field is written by
/// sync but deliberately not consulted here.
fn profile_tier(
    profile: Option<&UserProfile>,
    _ledger: Option<&LedgerSnapshot>,
    _now: DateTime<Utc>,
) -> Option<SubscriptionStatus> {
    let profile = profile?;
    let tier = profile.subscription_tier.filter(|t| t.is_paid())?;
    Some(SubscriptionStatus {
        tier,
        is_active: true,
        expiration_date: profile.subscription_expires_at,
        will_renew: profile.subscription_will_renew.unwrap_or(false),
        platform: Some(
            profile
                .subscription_platform
                .unwrap_or(Platform::WebBilling),
        ),
    })
}

/// Rule 3: alpha/beta code with a trial window still open.
fn special_code_trial(
    profile: Option<&UserProfile>,
    _ledger: Option<&LedgerSnapshot>,
    now: DateTime<Utc>,
) -> Option<SubscriptionStatus> {
    let profile = profile?;
    if !profile.has_trial_code() {
        return None;
    }
    let trial_ends = profile.free_trial_ends.filter(|ends| *ends > now)?;
    Some(SubscriptionStatus {
        tier: Tier::Plus,
        is_active: true,
        expiration_date: Some(trial_ends),
        will_renew: false,
        platform: None,
    })
}

/// Rule 4: alpha/beta code with no trial window recorded (legacy
/// grandfather case).
fn special_code_grandfathered(
    profile: Option<&UserProfile>,
    _ledger: Option<&LedgerSnapshot>,
    _now: DateTime<Utc>,
) -> Option<SubscriptionStatus> {
    let profile = profile?;
    if !profile.has_trial_code() || profile.free_trial_ends.is_some() {
        return None;
    }
    Some(SubscriptionStatus {
        tier: Tier::Plus,
        is_active: true,
        expiration_date: None,
        will_renew: false,
        platform: None,
    })
}

/// Rule 5: active entitlement in the purchase ledger, Connect before Plus.
fn ledger_entitlement(
    _profile: Option<&UserProfile>,
    ledger: Option<&LedgerSnapshot>,
    _now: DateTime<Utc>,
) -> Option<SubscriptionStatus> {
    let entitlement = ledger?.active_entitlement()?;
    Some(SubscriptionStatus {
        tier: entitlement.tier,
        is_active: true,
        expiration_date: entitlement.expiration_date,
        will_renew: entitlement.will_renew,
        platform: entitlement.platform,
    })
}

/// Run the cascade over one snapshot of inputs. Deterministic: later rules
/// are skipped once an earlier one matches.
pub fn evaluate(
    profile: Option<&UserProfile>,
    ledger: Option<&LedgerSnapshot>,
    now: DateTime<Utc>,
) -> Option<SubscriptionStatus> {
    for (name, rule) in RULES {
        if let Some(status) = rule(profile, ledger, now) {
            debug!(rule = name, tier = %status.tier, "entitlement rule matched");
            return Some(status);
        }
    }
    None
}

/// Resolves subscription status on demand. Never fails: every expected
/// failure mode degrades toward the free default.
pub struct EntitlementResolver {
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn PurchaseLedger>,
}

impl EntitlementResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>, ledger: Arc<dyn PurchaseLedger>) -> Self {
        Self { profiles, ledger }
    }

    /// Resolve the subscription status for a user.
    ///
    /// Profile fetch failure degrades to ledger-based resolution; ledger
    /// fetch failure degrades to whatever the profile rules decided. With
    /// both sources unreachable (or no user id) the fail-open default
    /// `{free, inactive}` is returned. The ledger is only queried when no
    /// profile rule matched.
    pub async fn resolve(&self, user_id: &str) -> SubscriptionStatus {
        if user_id.is_empty() {
            return SubscriptionStatus::fail_open();
        }
        let now = Utc::now();

        let mut profile_failed = false;
        let profile = match self.profiles.fetch(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user = user_id, error = %e, "profile fetch failed, falling back to ledger");
                profile_failed = true;
                None
            }
        };

        if let Some(status) = evaluate(profile.as_ref(), None, now) {
            return status;
        }

        let mut ledger_failed = false;
        let snapshot = match self.ledger.entitlements(user_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(user = user_id, error = %e, "ledger fetch failed");
                ledger_failed = true;
                None
            }
        };

        if let Some(status) = evaluate(profile.as_ref(), snapshot.as_ref(), now) {
            return status;
        }

        if profile_failed && ledger_failed {
            return SubscriptionStatus::fail_open();
        }
        SubscriptionStatus::free()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::backend::testing::{FakeLedger, FakeProfileStore};
    use crate::entitlement::types::LedgerEntitlement;

    fn plus_snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            entitlements: vec![LedgerEntitlement {
                tier: Tier::Plus,
                is_active: true,
                expiration_date: Some(Utc::now() + chrono::Duration::days(30)),
                will_renew: true,
                platform: Some(Platform::IosStore),
            }],
        }
    }

    mod rules {
        use super::*;

        #[test]
        fn override_wins_regardless_of_ledger() {
            let profile = UserProfile {
                tier_override: Some(Tier::Connect),
                ..UserProfile::default()
            };
            let snapshot = plus_snapshot();
            let status = evaluate(Some(&profile), Some(&snapshot), Utc::now()).unwrap();
            assert_eq!(status.tier, Tier::Connect);
            assert!(status.is_active);
            assert!(!status.will_renew);
            assert_eq!(status.platform, Some(Platform::WebBilling));
        }

        #[test]
        fn free_override_is_not_a_grant() {
            let profile = UserProfile {
                tier_override: Some(Tier::Free),
                ..UserProfile::default()
            };
            assert!(tier_override(Some(&profile), None, Utc::now()).is_none());
        }

        #[test]
        fn profile_tier_presence_implies_active() {
            let profile = UserProfile {
                subscription_tier: Some(Tier::Plus),
                subscription_will_renew: Some(true),
                subscription_platform: Some(Platform::AndroidStore),
                ..UserProfile::default()
            };
            let status = profile_tier(Some(&profile), None, Utc::now()).unwrap();
            assert_eq!(status.tier, Tier::Plus);
            assert!(status.is_active);
            assert!(status.will_renew);
            assert_eq!(status.platform, Some(Platform::AndroidStore));
        }

        #[test]
        fn profile_tier_defaults_renewal_and_platform() {
            let profile = UserProfile {
                subscription_tier: Some(Tier::Connect),
                ..UserProfile::default()
            };
            let status = profile_tier(Some(&profile), None, Utc::now()).unwrap();
            assert!(!status.will_renew);
            assert_eq!(status.platform, Some(Platform::WebBilling));
        }

        #[test]
        fn trial_code_grants_plus_until_trial_end() {
            let ends = Utc::now() + chrono::Duration::days(1);
            let profile = UserProfile {
                special_code: Some("beta".to_string()),
                free_trial_ends: Some(ends),
                ..UserProfile::default()
            };
            let status = special_code_trial(Some(&profile), None, Utc::now()).unwrap();
            assert_eq!(status.tier, Tier::Plus);
            assert_eq!(status.expiration_date, Some(ends));
            assert!(!status.will_renew);
        }

        #[test]
        fn expired_trial_does_not_match() {
            let profile = UserProfile {
                special_code: Some("beta".to_string()),
                free_trial_ends: Some(Utc::now() - chrono::Duration::days(1)),
                ..UserProfile::default()
            };
            assert!(special_code_trial(Some(&profile), None, Utc::now()).is_none());
            // An expired window is not the grandfather case either
            assert!(special_code_grandfathered(Some(&profile), None, Utc::now()).is_none());
        }

        #[test]
        fn grandfathered_code_without_trial_window() {
            let profile = UserProfile {
                special_code: Some("alpha".to_string()),
                ..UserProfile::default()
            };
            let status = special_code_grandfathered(Some(&profile), None, Utc::now()).unwrap();
            assert_eq!(status.tier, Tier::Plus);
            assert!(status.is_active);
            assert!(status.expiration_date.is_none());
        }

        #[test]
        fn ledger_rule_carries_ledger_fields() {
            let snapshot = plus_snapshot();
            let status = ledger_entitlement(None, Some(&snapshot), Utc::now()).unwrap();
            assert_eq!(status.tier, Tier::Plus);
            assert!(status.will_renew);
            assert_eq!(status.platform, Some(Platform::IosStore));
            assert_eq!(
                status.expiration_date,
                snapshot.entitlements[0].expiration_date
            );
        }

        #[test]
        fn nothing_matches_on_empty_inputs() {
            assert!(evaluate(None, None, Utc::now()).is_none());
            assert!(evaluate(Some(&UserProfile::default()), None, Utc::now()).is_none());
        }
    }

    #[tokio::test]
    async fn profile_tier_wins_with_ledger_unreachable() {
        let profiles = Arc::new(FakeProfileStore::with_profile(UserProfile {
            subscription_tier: Some(Tier::Plus),
            ..UserProfile::default()
        }));
        let ledger = Arc::new(FakeLedger::unreachable());
        let resolver = EntitlementResolver::new(profiles, ledger.clone());

        let status = resolver.resolve("user_1").await;
        assert_eq!(status.tier, Tier::Plus);
        assert!(status.is_active);
        // Short-circuit: the ledger was never consulted
        assert_eq!(ledger.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ledger_resolves_when_profile_fetch_fails() {
        let profiles = Arc::new(FakeProfileStore::unreachable());
        let ledger = Arc::new(FakeLedger::with_snapshot(plus_snapshot()));
        let resolver = EntitlementResolver::new(profiles, ledger);

        let status = resolver.resolve("user_1").await;
        assert_eq!(status.tier, Tier::Plus);
        assert!(status.is_active);
    }

    #[tokio::test]
    async fn expired_trial_with_empty_ledger_resolves_free() {
        let profiles = Arc::new(FakeProfileStore::with_profile(UserProfile {
            special_code: Some("beta".to_string()),
            free_trial_ends: Some(Utc::now() - chrono::Duration::days(1)),
            ..UserProfile::default()
        }));
        let ledger = Arc::new(FakeLedger::empty());
        let resolver = EntitlementResolver::new(profiles, ledger);

        let status = resolver.resolve("user_1").await;
        assert_eq!(status.tier, Tier::Free);
        assert!(status.is_active);
    }

    #[tokio::test]
    async fn never_errors_with_everything_unreachable() {
        let profiles = Arc::new(FakeProfileStore::unreachable());
        let ledger = Arc::new(FakeLedger::unreachable());
        let resolver = EntitlementResolver::new(profiles, ledger);

        let status = resolver.resolve("user_1").await;
        assert_eq!(status, SubscriptionStatus::fail_open());
    }

    #[tokio::test]
    async fn empty_user_id_short_circuits_without_network() {
        let profiles = Arc::new(FakeProfileStore::unreachable());
        let ledger = Arc::new(FakeLedger::unreachable());
        let resolver = EntitlementResolver::new(profiles.clone(), ledger.clone());

        let status = resolver.resolve("").await;
        assert_eq!(status, SubscriptionStatus::fail_open());
        assert_eq!(profiles.reads.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_user_resolves_active_free() {
        let profiles = Arc::new(FakeProfileStore::empty());
        let ledger = Arc::new(FakeLedger::empty());
        let resolver = EntitlementResolver::new(profiles, ledger);

        let status = resolver.resolve("user_1").await;
        assert_eq!(status.tier, Tier::Free);
        assert!(status.is_active);
        assert!(!status.will_renew);
    }
}
