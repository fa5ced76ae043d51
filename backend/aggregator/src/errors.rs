//! Application-wide error types.
//!
//! "Not found" is deliberately absent from this enum: an empty resource,
//! table row, or event log is a valid empty state and is modelled as
//! `Option` / empty `Vec` at the call site, never as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-404 failure reported by the chain node.
    #[error("Chain error ({status}): {message}")]
    Chain { status: u16, message: String },

    /// Content-store upload or gateway failure that cannot be degraded away.
    #[error("Content store error: {0}")]
    ContentStore(String),

    /// The wallet bridge refused or failed to sign/submit.
    #[error("Wallet bridge error: {0}")]
    Wallet(String),

    /// No wallet session is active; mutating actions cannot proceed.
    #[error("No active wallet session")]
    NoSession,

    /// A mutating action failed its local precondition check.
    #[error("{0}")]
    Precondition(String),

    /// The transaction was included but the contract aborted it.
    #[error("Transaction {hash} failed: {message}")]
    TransactionFailed { hash: String, message: String },
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
