//! Wishwell client core
//!
//! The non-UI core of the Wishwell journaling app: subscription tier
//! resolution, feature access policy, the free-tier daily AI usage meter,
//! and best-effort tier synchronization to the backend profile. Screens
//! call into this crate through a [`Session`] handle; the backend profile
//! store, purchase ledger, identity provider and AI endpoint are external
//! collaborators behind narrow traits.

pub mod ai;
pub mod backend;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod log_sink;
pub mod session;
pub mod usage;

pub use config::Config;
pub use entitlement::{has_access, Feature, SubscriptionStatus, Tier};
pub use session::Session;
pub use usage::{UsageMeter, DAILY_LIMIT};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with a `RUST_LOG` env filter.
///
/// Default: warn for most crates, info for this one. Use `RUST_LOG=debug`
/// for verbose per-operation logs.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,wishwell_core=info")),
        )
        .init();
}
