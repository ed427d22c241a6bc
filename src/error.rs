//! Error types for the client core
//!
//! The entitlement resolver and the usage meter never surface expected
//! failures (network, missing auth) to callers; these types cover the
//! operations that do: purchases, AI calls, local storage, config.

use thiserror::Error;

/// Failure talking to the backend profile store or the purchase ledger.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Purchase and restore failures surfaced to the caller.
///
/// Cancellation is distinct from failure: the UI treats it as a silent
/// non-error while everything else is shown to the user.
#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("purchase cancelled")]
    Cancelled,
    #[error("no purchases to restore")]
    NothingToRestore,
    #[error("not signed in")]
    NotAuthenticated,
    #[error("purchase declined: {0}")]
    Declined(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// AI endpoint failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("daily AI limit reached")]
    DailyLimitReached,
    #[error("usage store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Local usage database failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session initialization failures.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Missing or malformed environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
}
