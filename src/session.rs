//! Session handle
//!
//! One explicit object returned from initialization instead of ambient
//! module state: callers hold the session and pass it to whatever needs
//! entitlements, metering or AI access.

use std::sync::Arc;

use crate::ai::{AiBackend, AiGateway, HttpAiClient};
use crate::backend::{
    AuthedUser, HttpProfileStore, HttpPurchaseLedger, Identity, ProfileStore, PurchaseLedger,
};
use crate::config::Config;
use crate::entitlement::{
    has_access, spawn_sync, EntitlementResolver, Feature, SubscriptionStatus,
};
use crate::error::{InitError, PurchaseError};
use crate::log_sink::{LogSink, TracingSink};
use crate::usage::{UsageMeter, UsageStore};

pub struct Session {
    identity: Arc<dyn Identity>,
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn PurchaseLedger>,
    resolver: Arc<EntitlementResolver>,
    meter: Arc<UsageMeter>,
    ai: AiGateway,
    sink: Arc<dyn LogSink>,
}

impl Session {
    /// Initialize a session against the configured backends, with the
    /// usage database at its default location.
    pub fn initialize(config: &Config, identity: Arc<dyn Identity>) -> Result<Self, InitError> {
        let profiles: Arc<dyn ProfileStore> = Arc::new(HttpProfileStore::new(config)?);
        let ledger: Arc<dyn PurchaseLedger> = Arc::new(HttpPurchaseLedger::new(config)?);
        let ai_backend: Arc<dyn AiBackend> = Arc::new(HttpAiClient::new(config)?);
        let store = Arc::new(UsageStore::open_default()?);
        Ok(Self::with_collaborators(
            identity,
            profiles,
            ledger,
            ai_backend,
            store,
            Arc::new(TracingSink),
        ))
    }

    /// Assemble a session from explicit collaborators (tests, alternate
    /// transports).
    pub fn with_collaborators(
        identity: Arc<dyn Identity>,
        profiles: Arc<dyn ProfileStore>,
        ledger: Arc<dyn PurchaseLedger>,
        ai_backend: Arc<dyn AiBackend>,
        store: Arc<UsageStore>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let resolver = Arc::new(EntitlementResolver::new(profiles.clone(), ledger.clone()));
        let meter = Arc::new(UsageMeter::new(
            store,
            profiles.clone(),
            identity.clone(),
            sink.clone(),
        ));
        let ai = AiGateway::new(ai_backend, resolver.clone(), meter.clone(), identity.clone());
        Self {
            identity,
            profiles,
            ledger,
            resolver,
            meter,
            ai,
            sink,
        }
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<AuthedUser> {
        self.identity.current_user()
    }

    /// Resolve the current user's subscription status. Fails open to the
    /// inactive free default when nobody is signed in.
    pub async fn status(&self) -> SubscriptionStatus {
        match self.identity.current_user() {
            Some(user) => self.resolver.resolve(&user.user_id).await,
            None => SubscriptionStatus::fail_open(),
        }
    }

    /// Whether the current user's tier grants a feature.
    pub async fn has_access(&self, feature: Feature) -> bool {
        has_access(self.status().await.tier, feature)
    }

    /// Daily AI usage meter for the current user.
    pub fn meter(&self) -> &UsageMeter {
        &self.meter
    }

    /// Tier-gated, metered AI endpoint access.
    pub fn ai(&self) -> &AiGateway {
        &self.ai
    }

    /// Purchase a package through the ledger, kick off a background tier
    /// sync, and return the freshly resolved status.
    ///
    /// Cancellation surfaces as `PurchaseError::Cancelled` so the UI can
    /// stay silent; all other failures are user-visible.
    pub async fn purchase(&self, package_id: &str) -> Result<SubscriptionStatus, PurchaseError> {
        let user = self
            .identity
            .current_user()
            .ok_or(PurchaseError::NotAuthenticated)?;

        let snapshot = self.ledger.purchase(&user.user_id, package_id).await?;
        drop(spawn_sync(
            self.profiles.clone(),
            self.ledger.clone(),
            self.sink.clone(),
            user.user_id.clone(),
            Some(snapshot),
        ));
        Ok(self.resolver.resolve(&user.user_id).await)
    }

    /// Restore prior purchases. A snapshot with no active entitlement is
    /// `PurchaseError::NothingToRestore`; the profile is still synced so
    /// a lapsed account converges.
    pub async fn restore(&self) -> Result<SubscriptionStatus, PurchaseError> {
        let user = self
            .identity
            .current_user()
            .ok_or(PurchaseError::NotAuthenticated)?;

        let snapshot = self.ledger.restore(&user.user_id).await?;
        let found_any = snapshot.active_tier().is_some();
        drop(spawn_sync(
            self.profiles.clone(),
            self.ledger.clone(),
            self.sink.clone(),
            user.user_id.clone(),
            Some(snapshot),
        ));
        if !found_any {
            return Err(PurchaseError::NothingToRestore);
        }
        Ok(self.resolver.resolve(&user.user_id).await)
    }

    /// Best-effort tier sync on app foreground. Returns the detached task
    /// handle; production callers drop it.
    pub fn sync_on_foreground(&self) -> Option<tokio::task::JoinHandle<()>> {
        let user = self.identity.current_user()?;
        Some(spawn_sync(
            self.profiles.clone(),
            self.ledger.clone(),
            self.sink.clone(),
            user.user_id,
            None,
        ))
    }
}
