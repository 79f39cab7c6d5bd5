//! Error types used throughout the application
//!
//! The sync-facing variants mirror the failure taxonomy of the reconciliation
//! engine: expired credentials retry once, invalid cursors self-heal via a
//! full resync, transient provider failures leave stored state untouched, and
//! persistence failures abort the batch before the cursor advances.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Quorum
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum QuorumError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Access token rejected by the provider. Eligible for exactly one
    /// forced refresh + retry before becoming terminal for the attempt.
    #[error("Access token expired: {0}")]
    AuthExpired(String),

    /// No stored credentials for the user. Terminal; surfaced as
    /// "not connected" rather than retried.
    #[error("Calendar not connected: {0}")]
    NotConnected(String),

    /// The provider reported the incremental sync cursor invalid or expired.
    /// Self-healing: the caller clears the cursor and performs a full resync.
    #[error("Sync cursor invalid or expired")]
    CursorInvalid,

    /// Provider-side failure (5xx, connection refused). Transient; retried
    /// on the next scheduled tick.
    #[error("Provider unavailable: {0}")]
    Provider(String),

    /// A bounded timeout elapsed on an external call. Transient.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuorumError {
    /// True for failures that should be retried on the next scheduled tick
    /// without mutating stored cursor or watch state.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Timeout(_) | Self::Network(_))
    }
}

/// Result type alias for Quorum operations
pub type Result<T> = std::result::Result<T, QuorumError>;
