//! Ethereum JSON-RPC ledger source.
//!
//! Filters are emulated client-side with `eth_getLogs` over a moving block range instead of
//! node-side `eth_newFilter` handles, which nodes drop after a few minutes of inactivity and
//! which do not survive a reconnection anyway.

use std::{future::Future, time::Duration};

use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::Filter;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::{
    error::ConnectionError,
    source::{FilterSpec, LedgerConnection, LedgerSource, PollBatch, RawLog},
};

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of blocks covered by one `eth_getLogs` request.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;

/// Ledger source backed by an Ethereum HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct EthLedgerSource {
    request_timeout: Duration,
    max_block_range: u64,
}

impl Default for EthLedgerSource {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT, DEFAULT_MAX_BLOCK_RANGE)
    }
}

impl EthLedgerSource {
    /// Create a new source. `max_block_range` is clamped to at least one block.
    pub fn new(request_timeout: Duration, max_block_range: u64) -> Self {
        Self {
            request_timeout,
            max_block_range: max_block_range.max(1),
        }
    }
}

#[async_trait]
impl LedgerSource for EthLedgerSource {
    type Connection = EthConnection;

    async fn connect(&self, endpoint: &Url) -> Result<EthConnection, ConnectionError> {
        let connection = EthConnection {
            provider: RootProvider::new_http(endpoint.clone()),
            request_timeout: self.request_timeout,
            max_block_range: self.max_block_range,
        };

        // HTTP providers connect lazily, so query the node once.
        let head = connection.latest_block().await?;
        debug!(url = %endpoint, head, "Source ledger reachable");

        Ok(connection)
    }
}

/// Live connection to an Ethereum node.
pub struct EthConnection {
    provider: RootProvider,
    request_timeout: Duration,
    max_block_range: u64,
}

/// Client-side log filter: the next block to scan and the log selection.
#[derive(Debug, Clone)]
pub struct EthLogFilter {
    filter: Filter,
    next_block: u64,
}

impl EthLogFilter {
    /// Next block the filter will scan.
    pub fn next_block(&self) -> u64 {
        self.next_block
    }
}

impl EthConnection {
    async fn with_timeout<T, E: std::fmt::Display>(
        &self,
        request: impl Future<Output = Result<T, E>>,
    ) -> Result<T, ConnectionError> {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ConnectionError::Timeout(self.request_timeout))?
            .map_err(|e| ConnectionError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl LedgerConnection for EthConnection {
    type Filter = EthLogFilter;

    async fn latest_block(&self) -> Result<u64, ConnectionError> {
        self.with_timeout(async { self.provider.get_block_number().await })
            .await
    }

    async fn create_filter(
        &self,
        spec: FilterSpec,
        from_block: u64,
    ) -> Result<EthLogFilter, ConnectionError> {
        Ok(EthLogFilter {
            filter: Filter::new()
                .address(spec.contract)
                .event_signature(spec.event_topic),
            next_block: from_block,
        })
    }

    async fn poll(&self, filter: &mut EthLogFilter) -> Result<PollBatch, ConnectionError> {
        let head = self.latest_block().await?;
        if head < filter.next_block {
            return Ok(PollBatch::idle());
        }

        let from_block = filter.next_block;
        let to_block = head.min(from_block.saturating_add(self.max_block_range - 1));
        let range = filter.filter.clone().from_block(from_block).to_block(to_block);

        let logs = self
            .with_timeout(async { self.provider.get_logs(&range).await })
            .await?;

        debug!(
            from_block,
            to_block,
            head,
            logs = logs.len(),
            "Scanned block range for deposit logs"
        );

        filter.next_block = to_block + 1;
        Ok(PollBatch {
            logs: logs.into_iter().map(RawLog::from).collect(),
            scanned_to: Some(to_block),
            caught_up: to_block == head,
        })
    }
}
