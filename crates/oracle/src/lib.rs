//! Bridge deposit oracle - watches a source ledger for `BridgeDepositInitiated` logs and relays
//! each deposit to the destination relay endpoint.
//!
//! This crate provides:
//! - A [`RelayLoop`] that polls, decodes and delivers deposits, and recovers from connection loss
//! - An [`EventDecoder`] for deposit logs
//! - A [`RetryPolicy`] for exponential backoff with jitter
//! - The [`LedgerSource`] and [`RelayTransport`] seams, with Ethereum JSON-RPC and HTTP
//!   implementations
//!
//! ## Example
//!
//! ```ignore
//! use bridge_oracle::{Config, RelayLoop};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::load("config.toml")?;
//! config.validate()?;
//!
//! let relay_loop = RelayLoop::new(
//!     config.ledger_source(),
//!     config.relay_client()?,
//!     config.relay_settings(),
//! );
//! let stats = relay_loop.run(CancellationToken::new()).await;
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod eth_source;
pub mod metrics;
pub mod relay_loop;
pub mod retry;
pub mod source;
pub mod transport;

#[cfg(test)]
mod test_utils;

// Re-export main types at crate root for convenience.
pub use config::Config;
pub use decoder::{DEPOSIT_EVENT_SIGNATURE, EventDecoder};
pub use error::{ConnectionError, DecodeError, Error, Result};
pub use eth_source::EthLedgerSource;
pub use relay_loop::{ConnectionState, Disposition, RelayLoop, RelaySettings, RelayStats};
pub use retry::{Backoff, RetryPolicy};
pub use source::{FilterSpec, LedgerConnection, LedgerSource, PollBatch, RawLog};
pub use transport::{DeliveryOutcome, RelayTransport};

pub use bridge_relay_types::{DepositEvent, EventKey, RelayPayload};
