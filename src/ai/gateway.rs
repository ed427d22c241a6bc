//! Metered access to the AI endpoint
//!
//! Gates every AI call on the resolved tier: paid tiers pass unmetered,
//! free users spend one of their daily metered calls. The meter is checked
//! BEFORE the network call and incremented only after a successful one.

use std::sync::Arc;

use tracing::debug;

use crate::backend::Identity;
use crate::entitlement::{has_access, EntitlementResolver, Feature};
use crate::error::AiError;
use crate::usage::UsageMeter;

use super::client::{AiBackend, AiOperation};

pub struct AiGateway {
    backend: Arc<dyn AiBackend>,
    resolver: Arc<EntitlementResolver>,
    meter: Arc<UsageMeter>,
    identity: Arc<dyn Identity>,
}

impl AiGateway {
    pub fn new(
        backend: Arc<dyn AiBackend>,
        resolver: Arc<EntitlementResolver>,
        meter: Arc<UsageMeter>,
        identity: Arc<dyn Identity>,
    ) -> Self {
        Self {
            backend,
            resolver,
            meter,
            identity,
        }
    }

    /// Generate a journaling prompt for a wish/goal topic.
    pub async fn generate_prompt(&self, topic: &str) -> Result<String, AiError> {
        self.call(AiOperation::GeneratePrompt, topic).await
    }

    /// Reflect on a finished journal entry.
    pub async fn reflect(&self, entry: &str) -> Result<String, AiError> {
        self.call(AiOperation::Reflect, entry).await
    }

    /// Clean up a raw voice transcript.
    pub async fn clean_transcript(&self, raw: &str) -> Result<String, AiError> {
        self.call(AiOperation::CleanTranscript, raw).await
    }

    async fn call(&self, operation: AiOperation, input: &str) -> Result<String, AiError> {
        let user = self
            .identity
            .current_user()
            .ok_or(AiError::NotAuthenticated)?;
        let token = self.identity.auth_token().ok_or(AiError::NotAuthenticated)?;

        let status = self.resolver.resolve(&user.user_id).await;
        let metered = !has_access(status.tier, Feature::Ai);

        // The cap is a blocked action, not an error from the endpoint:
        // it applies before any AI network call is made.
        if metered && !self.meter.can_use() {
            debug!(user = %user.user_id, "daily AI limit reached");
            return Err(AiError::DailyLimitReached);
        }

        let output = self.backend.invoke(&token, operation, input).await?;

        // Only successful invocations consume metered calls
        if metered {
            self.meter.increment().await;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::backend::testing::{FakeLedger, FakeProfileStore, StaticIdentity};
    use crate::backend::{ProfileStore, PurchaseLedger};
    use crate::entitlement::types::{Tier, UserProfile};
    use crate::error::BackendError;
    use crate::log_sink::RecordingSink;
    use crate::usage::{UsageStore, DAILY_LIMIT};

    #[derive(Default)]
    struct FakeAiBackend {
        calls: AtomicU32,
        fail: AtomicBool,
    }

    #[async_trait]
    impl AiBackend for FakeAiBackend {
        async fn invoke(
            &self,
            _token: &str,
            _operation: AiOperation,
            input: &str,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(BackendError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(format!("echo: {input}"))
        }
    }

    struct Fixture {
        gateway: AiGateway,
        backend: Arc<FakeAiBackend>,
        meter: Arc<UsageMeter>,
    }

    fn fixture(profile: Option<UserProfile>) -> Fixture {
        let profiles: Arc<FakeProfileStore> = Arc::new(match profile {
            Some(p) => FakeProfileStore::with_profile(p),
            None => FakeProfileStore::empty(),
        });
        let ledger = Arc::new(FakeLedger::empty());
        let identity = Arc::new(StaticIdentity::signed_in("user_1"));
        let sink = Arc::new(RecordingSink::new());

        let resolver = Arc::new(EntitlementResolver::new(
            profiles.clone() as Arc<dyn ProfileStore>,
            ledger as Arc<dyn PurchaseLedger>,
        ));
        let meter = Arc::new(UsageMeter::new(
            Arc::new(UsageStore::in_memory().unwrap()),
            profiles,
            identity.clone(),
            sink,
        ));
        let backend = Arc::new(FakeAiBackend::default());

        Fixture {
            gateway: AiGateway::new(backend.clone(), resolver, meter.clone(), identity),
            backend,
            meter,
        }
    }

    #[tokio::test]
    async fn free_user_is_blocked_on_the_fourth_call() {
        let fx = fixture(None);

        for _ in 0..DAILY_LIMIT {
            fx.gateway.generate_prompt("gratitude").await.unwrap();
        }
        let err = fx.gateway.generate_prompt("gratitude").await.unwrap_err();
        assert!(matches!(err, AiError::DailyLimitReached));

        // Blocked before the endpoint was touched a fourth time
        assert_eq!(fx.backend.calls.load(Ordering::SeqCst), DAILY_LIMIT);
        assert_eq!(fx.meter.remaining(), 0);
    }

    #[tokio::test]
    async fn paid_user_is_unmetered() {
        let fx = fixture(Some(UserProfile {
            subscription_tier: Some(Tier::Plus),
            ..UserProfile::default()
        }));

        for _ in 0..(DAILY_LIMIT + 2) {
            fx.gateway.reflect("today I ...").await.unwrap();
        }
        assert_eq!(
            fx.backend.calls.load(Ordering::SeqCst),
            DAILY_LIMIT + 2
        );
        // The meter was never consulted or advanced
        assert_eq!(fx.meter.count_today(), 0);
    }

    #[tokio::test]
    async fn failed_invocation_does_not_consume_a_metered_call() {
        let fx = fixture(None);
        fx.backend.fail.store(true, Ordering::SeqCst);

        let err = fx.gateway.clean_transcript("um, so").await.unwrap_err();
        assert!(matches!(err, AiError::Backend(_)));
        assert_eq!(fx.meter.remaining(), DAILY_LIMIT);
    }

    #[tokio::test]
    async fn signed_out_user_cannot_invoke() {
        let profiles = Arc::new(FakeProfileStore::empty());
        let ledger = Arc::new(FakeLedger::empty());
        let identity = Arc::new(StaticIdentity::signed_out());
        let sink = Arc::new(RecordingSink::new());
        let resolver = Arc::new(EntitlementResolver::new(
            profiles.clone() as Arc<dyn ProfileStore>,
            ledger as Arc<dyn PurchaseLedger>,
        ));
        let meter = Arc::new(UsageMeter::new(
            Arc::new(UsageStore::in_memory().unwrap()),
            profiles,
            identity.clone(),
            sink,
        ));
        let backend = Arc::new(FakeAiBackend::default());
        let gateway = AiGateway::new(backend.clone(), resolver, meter, identity);

        let err = gateway.generate_prompt("x").await.unwrap_err();
        assert!(matches!(err, AiError::NotAuthenticated));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
