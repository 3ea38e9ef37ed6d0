//! Source ledger abstraction.
//!
//! A [`LedgerSource`] opens [`LedgerConnection`]s. A connection owns whatever the transport
//! needs (HTTP client, socket) and is dropped by the relay loop when it fails, so nothing is
//! carried over from one connection to the next except the poll cursor.

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use url::Url;

use crate::error::ConnectionError;

/// Log entry as returned by the source ledger, before decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLog {
    /// Contract that emitted the log.
    pub address: Address,
    /// Indexed topics, signature first.
    pub topics: Vec<B256>,
    /// Non-indexed ABI-encoded data.
    pub data: Bytes,
    /// Block number, absent for pending logs.
    pub block_number: Option<u64>,
    /// Transaction hash, absent for pending logs.
    pub transaction_hash: Option<B256>,
    /// Index of the log inside its block, absent for pending logs.
    pub log_index: Option<u64>,
}

impl RawLog {
    /// Sort key relaying follows. Logs without a position sort last.
    pub fn position(&self) -> (u64, u64) {
        (
            self.block_number.unwrap_or(u64::MAX),
            self.log_index.unwrap_or(u64::MAX),
        )
    }
}

impl From<alloy_rpc_types_eth::Log> for RawLog {
    fn from(log: alloy_rpc_types_eth::Log) -> Self {
        Self {
            address: log.inner.address,
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

/// Result of one poll of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollBatch {
    /// Matching logs, in any order.
    pub logs: Vec<RawLog>,
    /// Highest block covered by this poll, `None` when nothing new was scanned.
    pub scanned_to: Option<u64>,
    /// Whether the scan reached the ledger head.
    pub caught_up: bool,
}

impl PollBatch {
    /// Batch of a poll that found the filter already at the ledger head.
    pub fn idle() -> Self {
        Self {
            caught_up: true,
            ..Default::default()
        }
    }
}

/// Which logs a filter selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSpec {
    /// Bridge contract address.
    pub contract: Address,
    /// Event signature hash (topic0).
    pub event_topic: B256,
}

/// Factory for connections to a source ledger.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Live connection type.
    type Connection: LedgerConnection;

    /// Connects to the ledger node at `endpoint`.
    async fn connect(&self, endpoint: &Url) -> Result<Self::Connection, ConnectionError>;
}

/// A live connection to a source ledger.
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Filter handle created by [`Self::create_filter`].
    type Filter: Send + Sync;

    /// Returns the current head block number.
    async fn latest_block(&self) -> Result<u64, ConnectionError>;

    /// Creates a filter yielding logs matching `spec` from `from_block` (inclusive) onwards.
    async fn create_filter(
        &self,
        spec: FilterSpec,
        from_block: u64,
    ) -> Result<Self::Filter, ConnectionError>;

    /// Scans the blocks following the previous poll of `filter` and returns their logs.
    async fn poll(&self, filter: &mut Self::Filter) -> Result<PollBatch, ConnectionError>;
}
