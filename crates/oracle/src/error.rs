//! Error types for the bridge oracle.

use std::time::Duration;

use thiserror::Error;

/// Errors that stop the oracle from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml_edit::de::Error),

    /// Relay client could not be constructed.
    #[error("relay client error: {0}")]
    Relay(#[from] bridge_relay_client::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Connection-level failure talking to the source ledger.
///
/// Drives the reconnection state machine, never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Transport or RPC failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to turn a raw log into a deposit event.
///
/// Local to one log entry: the entry is logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Log is not a deposit event (wrong signature or topic count).
    #[error("unexpected log shape: {0}")]
    UnexpectedShape(String),

    /// Log has the deposit signature but a field is malformed or missing.
    #[error("malformed field `{field}`: {reason}")]
    MalformedField {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            reason: reason.into(),
        }
    }
}
