//! Failure sink for fire-and-forget background work
//!
//! Tier sync and usage mirroring are best-effort: the triggering operation
//! never awaits them and never observes their errors. Failures are captured
//! into a sink so they stay visible in logs and assertable in tests.

use std::sync::Mutex;

use tracing::warn;

/// Receives failures from detached background tasks.
pub trait LogSink: Send + Sync {
    /// Record a background failure. `context` names the task, `error` is
    /// the failure rendered as a string.
    fn failure(&self, context: &str, error: &str);
}

/// Default sink: forwards to `tracing` at warn level.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn failure(&self, context: &str, error: &str) {
        warn!(context = context, error = error, "background task failed");
    }
}

/// Recording sink for tests: keeps every failure in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded failures as (context, error) pairs.
    pub fn events(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LogSink for RecordingSink {
    fn failure(&self, context: &str, error: &str) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((context.to_string(), error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_failures() {
        let sink = RecordingSink::new();
        sink.failure("tier sync", "profile write failed");
        sink.failure("usage mirror", "timeout");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "tier sync");
        assert_eq!(events[1].1, "timeout");
    }
}
