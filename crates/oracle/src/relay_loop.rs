//! # Relay Loop
//!
//! This module provides [`RelayLoop`], which polls the source ledger for deposit logs, decodes
//! them and forwards each deposit to the destination relay endpoint.
//!
//! ## Connection state machine
//!
//! ```text
//!                 poll error                 immediate
//!   Connected ───────────────> Disconnected ───────────> Reconnecting ─┐
//!       ^                                                   │    ^     │ connect or
//!       └───────────────────────────────────────────────────┘    └─────┘ filter error
//!                     connect + filter from cursor
//! ```
//!
//! The loop starts in `Reconnecting` with attempt 0, so the first connection is made without
//! waiting. `Shutdown` is reachable from every state once the shutdown token is cancelled.
//!
//! ## Delivery guarantees
//!
//! Logs of one poll are relayed one at a time, ordered by `(block_number, log_index)`. The poll
//! cursor is the last scanned block and only moves once the whole batch has been dispatched,
//! including past ranges without any deposit. A reconnection recreates the filter from the
//! cursor block, so an interrupted batch is polled again. Keys of dispatched
//! events at or above the cursor are remembered for the lifetime of the loop and never relayed
//! twice.

use std::{collections::BTreeSet, fmt, future::Future, mem, time::Duration};

use alloy_primitives::Address;
use bridge_relay_types::{DepositEvent, EventKey, RelayPayload};
use tokio::{sync::watch, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    decoder::EventDecoder,
    error::ConnectionError,
    metrics::{self, EventOutcome},
    retry::{Backoff, RetryPolicy},
    source::{FilterSpec, LedgerConnection, LedgerSource, PollBatch, RawLog},
    transport::{DeliveryOutcome, RelayTransport},
};

/// Observable connection state of a [`RelayLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
    Shutdown,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal state. The live connection only exists while connected.
enum Phase<C: LedgerConnection> {
    Connected { connection: C, filter: C::Filter },
    Disconnected,
    Reconnecting { attempt: u32 },
    Shutdown,
}

impl<C: LedgerConnection> Phase<C> {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Connected { .. } => ConnectionState::Connected,
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Reconnecting { .. } => ConnectionState::Reconnecting,
            Self::Shutdown => ConnectionState::Shutdown,
        }
    }
}

/// Static parameters of a relay loop.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Source ledger RPC endpoint.
    pub rpc_url: Url,
    /// Bridge contract emitting deposit logs.
    pub contract: Address,
    /// Decoder for the deposit event.
    pub decoder: EventDecoder,
    /// Chain id reported as the deposit origin.
    pub source_chain_id: u64,
    /// First block to scan. Defaults to the ledger head at first connection.
    pub start_block: Option<u64>,
    /// Wait after an empty poll that reached the ledger head.
    pub poll_interval: Duration,
    /// Backoff between delivery attempts of one deposit.
    pub delivery_policy: RetryPolicy,
    /// Backoff between reconnection attempts.
    pub reconnect_policy: RetryPolicy,
}

impl RelaySettings {
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec {
            contract: self.contract,
            event_topic: self.decoder.topic(),
        }
    }
}

/// How the delivery of one deposit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Delivered { attempts: u32 },
    Dropped { attempts: u32, reason: String },
}

/// Counters over the lifetime of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Deposits accepted by the relay endpoint.
    pub delivered: u64,
    /// Deposits given up on.
    pub dropped: u64,
    /// Logs that failed to decode.
    pub skipped: u64,
    /// Logs already dispatched earlier in this run.
    pub duplicates: u64,
}

/// Polls the source ledger and relays deposits.
pub struct RelayLoop<S: LedgerSource, T> {
    source: S,
    transport: T,
    settings: RelaySettings,
    phase: Phase<S::Connection>,
    cursor: Option<u64>,
    cursor_tx: watch::Sender<Option<u64>>,
    seen: BTreeSet<EventKey>,
    stats: RelayStats,
}

impl<S: LedgerSource, T: RelayTransport> RelayLoop<S, T> {
    pub fn new(source: S, transport: T, settings: RelaySettings) -> Self {
        let cursor = settings.start_block;
        let (cursor_tx, _) = watch::channel(cursor);
        Self {
            source,
            transport,
            settings,
            phase: Phase::Reconnecting { attempt: 0 },
            cursor,
            cursor_tx,
            seen: BTreeSet::new(),
            stats: RelayStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.phase.state()
    }

    /// Last scanned block whose deposits were all dispatched, `None` before the first
    /// connection when no start block is configured.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Subscribes to cursor updates.
    pub fn cursor_watch(&self) -> watch::Receiver<Option<u64>> {
        self.cursor_tx.subscribe()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Runs until `shutdown_token` is cancelled and returns the final counters.
    pub async fn run(mut self, shutdown_token: CancellationToken) -> RelayStats {
        info!(
            rpc_url = %self.settings.rpc_url,
            contract = %self.settings.contract,
            start_block = ?self.settings.start_block,
            "Relay loop started"
        );

        while self.step(&shutdown_token).await != ConnectionState::Shutdown {}

        info!(
            cursor = ?self.cursor,
            delivered = self.stats.delivered,
            dropped = self.stats.dropped,
            skipped = self.stats.skipped,
            duplicates = self.stats.duplicates,
            "Relay loop stopped"
        );
        self.stats
    }

    /// Advances the state machine by one transition and returns the new state.
    pub async fn step(&mut self, shutdown_token: &CancellationToken) -> ConnectionState {
        let from = self.phase.state();
        let phase = mem::replace(&mut self.phase, Phase::Shutdown);

        let next = if shutdown_token.is_cancelled() {
            Phase::Shutdown
        } else {
            match phase {
                Phase::Connected { connection, filter } => {
                    self.poll(connection, filter, shutdown_token).await
                }
                Phase::Disconnected => Phase::Reconnecting { attempt: 1 },
                Phase::Reconnecting { attempt } => self.reconnect(attempt, shutdown_token).await,
                Phase::Shutdown => Phase::Shutdown,
            }
        };

        let to = next.state();
        if from != to || to == ConnectionState::Reconnecting {
            info!(from = %from, to = %to, cursor = ?self.cursor, "Connection state changed");
            metrics::record_transition(from, to);
        }
        self.phase = next;
        to
    }

    async fn reconnect(
        &mut self,
        attempt: u32,
        shutdown_token: &CancellationToken,
    ) -> Phase<S::Connection> {
        let delay = self.settings.reconnect_policy.delay(attempt);
        if !delay.is_zero() {
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Waiting before reconnecting to source ledger"
            );
            if until_shutdown(shutdown_token, tokio::time::sleep(delay))
                .await
                .is_none()
            {
                return Phase::Shutdown;
            }
        }

        let spec = self.settings.filter_spec();
        let cursor = self.cursor;
        let source = &self.source;
        let rpc_url = &self.settings.rpc_url;
        let connect = async move {
            let connection = source.connect(rpc_url).await?;
            let from_block = match cursor {
                Some(cursor) => cursor,
                None => connection.latest_block().await?,
            };
            let filter = connection.create_filter(spec, from_block).await?;
            Ok::<_, ConnectionError>((connection, filter, from_block))
        };

        let result = until_shutdown(shutdown_token, connect).await;
        match result {
            None => Phase::Shutdown,
            Some(Ok((connection, filter, from_block))) => {
                info!(
                    rpc_url = %self.settings.rpc_url,
                    from_block,
                    "Connected to source ledger"
                );
                if self.cursor.is_none() {
                    self.set_cursor(from_block);
                }
                Phase::Connected { connection, filter }
            }
            Some(Err(e)) => {
                warn!(
                    rpc_url = %self.settings.rpc_url,
                    attempt,
                    error = %e,
                    "Failed to connect to source ledger"
                );
                Phase::Reconnecting {
                    attempt: attempt.saturating_add(1),
                }
            }
        }
    }

    async fn poll(
        &mut self,
        connection: S::Connection,
        mut filter: <S::Connection as LedgerConnection>::Filter,
        shutdown_token: &CancellationToken,
    ) -> Phase<S::Connection> {
        let batch = match until_shutdown(shutdown_token, connection.poll(&mut filter)).await {
            None => return Phase::Shutdown,
            Some(Ok(batch)) => batch,
            Some(Err(e)) => {
                warn!(cursor = ?self.cursor, error = %e, "Lost connection to source ledger");
                return Phase::Disconnected;
            }
        };

        let PollBatch {
            logs,
            scanned_to,
            caught_up,
        } = batch;
        let idle = logs.is_empty() && caught_up;

        if !self.dispatch_batch(logs, scanned_to, shutdown_token).await {
            return Phase::Shutdown;
        }

        // Only wait once the scan has reached the head.
        if idle {
            let sleep = tokio::time::sleep(self.settings.poll_interval);
            if until_shutdown(shutdown_token, sleep).await.is_none() {
                return Phase::Shutdown;
            }
        }

        Phase::Connected { connection, filter }
    }

    /// Relays a polled batch in order, then moves the cursor to `scanned_to`. Returns `false`
    /// if interrupted by shutdown, in which case the cursor is left untouched.
    async fn dispatch_batch(
        &mut self,
        mut logs: Vec<RawLog>,
        scanned_to: Option<u64>,
        shutdown_token: &CancellationToken,
    ) -> bool {
        if !logs.is_empty() {
            logs.sort_by_key(RawLog::position);
            debug!(logs = logs.len(), cursor = ?self.cursor, "Dispatching deposit logs");
        }

        let mut high_water = scanned_to;
        for log in &logs {
            high_water = high_water.max(log.block_number);

            let event = match self.settings.decoder.decode(log) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        tx_hash = ?log.transaction_hash,
                        block_number = ?log.block_number,
                        log_index = ?log.log_index,
                        error = %e,
                        "Skipping undecodable log"
                    );
                    self.stats.skipped += 1;
                    metrics::record_event(EventOutcome::Skipped);
                    continue;
                }
            };

            let key = event.key();
            if self.seen.contains(&key) {
                debug!(key = %key, "Skipping already dispatched deposit");
                self.stats.duplicates += 1;
                metrics::record_event(EventOutcome::Duplicate);
                continue;
            }

            match self.deliver(&event, shutdown_token).await {
                None => return false,
                Some(Disposition::Delivered { .. }) => {
                    self.stats.delivered += 1;
                    metrics::record_event(EventOutcome::Delivered);
                }
                Some(Disposition::Dropped { .. }) => {
                    self.stats.dropped += 1;
                    metrics::record_event(EventOutcome::Dropped);
                }
            }
            self.seen.insert(key);
        }

        if let Some(block) = high_water
            && self.cursor.is_none_or(|cursor| block > cursor)
        {
            self.set_cursor(block);
        }
        if let Some(cursor) = self.cursor {
            self.seen = self.seen.split_off(&EventKey::block_start(cursor));
        }
        true
    }

    /// Delivers one deposit under the delivery retry policy. Returns `None` if interrupted by
    /// shutdown.
    pub async fn deliver(
        &self,
        event: &DepositEvent,
        shutdown_token: &CancellationToken,
    ) -> Option<Disposition> {
        let payload = RelayPayload::new(event, self.settings.source_chain_id);
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let outcome = until_shutdown(shutdown_token, self.transport.deliver(&payload)).await?;
            metrics::record_delivery_attempt(&outcome, started.elapsed());

            let reason = match outcome {
                DeliveryOutcome::Delivered => {
                    info!(
                        tx_hash = %event.source_tx_hash,
                        block_number = event.block_number,
                        log_index = event.log_index,
                        amount = %event.amount,
                        attempt,
                        "Relayed deposit"
                    );
                    return Some(Disposition::Delivered { attempts: attempt });
                }
                DeliveryOutcome::PermanentFailure(reason) => {
                    error!(
                        tx_hash = %event.source_tx_hash,
                        block_number = event.block_number,
                        attempt,
                        reason = %reason,
                        "Relay rejected deposit, dropping"
                    );
                    return Some(Disposition::Dropped {
                        attempts: attempt,
                        reason,
                    });
                }
                DeliveryOutcome::TransientFailure(reason) => reason,
            };

            match self.settings.delivery_policy.next(attempt) {
                Backoff::Terminal => {
                    error!(
                        tx_hash = %event.source_tx_hash,
                        block_number = event.block_number,
                        attempt,
                        reason = %reason,
                        "Relay attempts exhausted, dropping deposit"
                    );
                    return Some(Disposition::Dropped {
                        attempts: attempt,
                        reason,
                    });
                }
                Backoff::Wait(delay) => {
                    warn!(
                        tx_hash = %event.source_tx_hash,
                        block_number = event.block_number,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Relay attempt failed, retrying"
                    );
                    until_shutdown(shutdown_token, tokio::time::sleep(delay)).await?;
                }
            }
            attempt += 1;
        }
    }

    fn set_cursor(&mut self, block_number: u64) {
        self.cursor = Some(block_number);
        self.cursor_tx.send_replace(Some(block_number));
        metrics::record_cursor(block_number);
    }
}

/// Awaits `future` unless `shutdown_token` is cancelled first.
async fn until_shutdown<F: Future>(
    shutdown_token: &CancellationToken,
    future: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;

        _ = shutdown_token.cancelled() => None,
        output = future => Some(output),
    }
}
