//! Daily AI usage metering
//!
//! This module handles:
//! - Reference-timezone (UTC-10) day-key arithmetic
//! - Local SQLite persistence of per-day counters
//! - The free-tier daily meter with best-effort backend mirroring

pub mod day;
mod meter;
mod store;

pub use meter::{UsageMeter, DAILY_LIMIT};
pub use store::UsageStore;
