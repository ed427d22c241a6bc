//! Daily AI usage meter
//!
//! Counts AI invocations per reference-timezone day for the current
//! identity. Consulted only for free-tier users; the meter itself has no
//! tier awareness. The local store decides, the backend copy is a
//! best-effort mirror whose failures never reach the caller.

use std::sync::Arc;

use tracing::debug;

use super::day::today_key;
use super::store::UsageStore;
use crate::backend::{Identity, ProfilePatch, ProfileStore};
use crate::entitlement::types::AiUsageRecord;
use crate::log_sink::LogSink;

/// Free-tier AI invocations allowed per reference-timezone day.
pub const DAILY_LIMIT: u32 = 3;

pub struct UsageMeter {
    store: Arc<UsageStore>,
    profiles: Arc<dyn ProfileStore>,
    identity: Arc<dyn Identity>,
    sink: Arc<dyn LogSink>,
}

impl UsageMeter {
    pub fn new(
        store: Arc<UsageStore>,
        profiles: Arc<dyn ProfileStore>,
        identity: Arc<dyn Identity>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            store,
            profiles,
            identity,
            sink,
        }
    }

    fn current_user_id(&self) -> Option<String> {
        self.identity.current_user().map(|u| u.user_id)
    }

    /// Calls made so far today. A record keyed to a prior day reads as 0;
    /// the day rollover needs no explicit reset. No signed-in user or a
    /// failed local read also count as 0.
    pub fn count_today(&self) -> u32 {
        let Some(user_id) = self.current_user_id() else {
            return 0;
        };
        match self.store.count_for(&user_id, &today_key()) {
            Ok(count) => count,
            Err(e) => {
                self.sink.failure("usage read", &e.to_string());
                0
            }
        }
    }

    /// Calls left today, clamped at 0.
    pub fn remaining(&self) -> u32 {
        if self.current_user_id().is_none() {
            // Unusable without a signed-in user
            return 0;
        }
        DAILY_LIMIT.saturating_sub(self.count_today())
    }

    /// Whether another AI call is allowed today.
    pub fn can_use(&self) -> bool {
        self.remaining() > 0
    }

    /// Record one AI invocation. Call only after a successful invocation.
    ///
    /// Persists locally, then mirrors `{date, count}` to the backend
    /// profile. Mirror failures go to the log sink, never to the caller.
    pub async fn increment(&self) -> u32 {
        let Some(user_id) = self.current_user_id() else {
            debug!("usage increment with no signed-in user, ignoring");
            return 0;
        };
        let today = today_key();
        let count = match self.store.increment(&user_id, &today) {
            Ok(count) => count,
            Err(e) => {
                self.sink.failure("usage increment", &e.to_string());
                return 0;
            }
        };
        debug!(user = %user_id, count = count, "incremented AI usage");
        self.mirror(&user_id, today, count).await;
        count
    }

    /// Force today's count to 0 (administrative/testing escape hatch).
    pub async fn reset(&self) {
        let Some(user_id) = self.current_user_id() else {
            return;
        };
        let today = today_key();
        if let Err(e) = self.store.set_count(&user_id, &today, 0) {
            self.sink.failure("usage reset", &e.to_string());
            return;
        }
        self.mirror(&user_id, today, 0).await;
    }

    /// Best-effort mirror to the backend profile for cross-device
    /// visibility. The mirror is not authoritative.
    async fn mirror(&self, user_id: &str, date: String, count: u32) {
        let patch = ProfilePatch {
            ai_usage: Some(AiUsageRecord { date, count }),
            ..ProfilePatch::default()
        };
        if let Err(e) = self.profiles.merge(user_id, &patch).await {
            self.sink.failure("usage mirror", &e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{FakeProfileStore, StaticIdentity};
    use crate::log_sink::RecordingSink;
    use crate::usage::day::{day_key, today_key};

    fn meter_with(
        profiles: Arc<FakeProfileStore>,
        identity: StaticIdentity,
        sink: Arc<RecordingSink>,
    ) -> UsageMeter {
        UsageMeter::new(
            Arc::new(UsageStore::in_memory().unwrap()),
            profiles,
            Arc::new(identity),
            sink,
        )
    }

    #[tokio::test]
    async fn limit_reached_after_three_increments() {
        let profiles = Arc::new(FakeProfileStore::empty());
        let sink = Arc::new(RecordingSink::new());
        let meter = meter_with(profiles.clone(), StaticIdentity::signed_in("user_1"), sink);

        assert_eq!(meter.remaining(), DAILY_LIMIT);
        for expected in 1..=DAILY_LIMIT {
            assert!(meter.can_use());
            assert_eq!(meter.increment().await, expected);
        }
        assert!(!meter.can_use());
        assert_eq!(meter.remaining(), 0);

        // One more does not drive remaining negative
        meter.increment().await;
        assert_eq!(meter.remaining(), 0);
    }

    #[tokio::test]
    async fn stale_day_reads_as_zero_without_reset() {
        let profiles = Arc::new(FakeProfileStore::empty());
        let sink = Arc::new(RecordingSink::new());
        let meter = meter_with(profiles, StaticIdentity::signed_in("user_1"), sink);

        let yesterday = day_key(chrono::Utc::now() - chrono::Duration::days(1));
        meter
            .store
            .set_count("user_1", &yesterday, DAILY_LIMIT)
            .unwrap();

        assert_eq!(meter.remaining(), DAILY_LIMIT);
        assert!(meter.can_use());
    }

    #[tokio::test]
    async fn increment_mirrors_to_profile() {
        let profiles = Arc::new(FakeProfileStore::empty());
        let sink = Arc::new(RecordingSink::new());
        let meter = meter_with(profiles.clone(), StaticIdentity::signed_in("user_1"), sink);

        meter.increment().await;
        meter.increment().await;

        let patches = profiles.patches();
        assert_eq!(patches.len(), 2);
        let mirrored = patches[1].ai_usage.as_ref().unwrap();
        assert_eq!(mirrored.count, 2);
        assert_eq!(mirrored.date, today_key());
    }

    #[tokio::test]
    async fn mirror_failure_goes_to_sink_not_caller() {
        let profiles = Arc::new(FakeProfileStore::unreachable());
        let sink = Arc::new(RecordingSink::new());
        let meter = meter_with(
            profiles,
            StaticIdentity::signed_in("user_1"),
            sink.clone(),
        );

        // Local count still advances even though the mirror fails
        assert_eq!(meter.increment().await, 1);
        assert_eq!(meter.count_today(), 1);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "usage mirror");
    }

    #[tokio::test]
    async fn signed_out_user_is_unusable_without_network() {
        let profiles = Arc::new(FakeProfileStore::unreachable());
        let sink = Arc::new(RecordingSink::new());
        let meter = meter_with(profiles.clone(), StaticIdentity::signed_out(), sink.clone());

        assert!(!meter.can_use());
        assert_eq!(meter.remaining(), 0);
        assert_eq!(meter.increment().await, 0);

        // No network attempt was made at all
        assert!(profiles.patches().is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn reset_zeroes_today() {
        let profiles = Arc::new(FakeProfileStore::empty());
        let sink = Arc::new(RecordingSink::new());
        let meter = meter_with(profiles.clone(), StaticIdentity::signed_in("user_1"), sink);

        meter.increment().await;
        meter.increment().await;
        meter.reset().await;

        assert_eq!(meter.count_today(), 0);
        assert_eq!(meter.remaining(), DAILY_LIMIT);

        let patches = profiles.patches();
        assert_eq!(patches.last().unwrap().ai_usage.as_ref().unwrap().count, 0);
    }
}
