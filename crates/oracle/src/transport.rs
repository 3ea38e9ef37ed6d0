//! Outbound relay transport.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_relay_client::RelayClient;
use bridge_relay_types::RelayPayload;
use tracing::debug;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the destination.
    Delivered,
    /// Failed, worth retrying.
    TransientFailure(String),
    /// Rejected, retrying cannot help.
    PermanentFailure(String),
}

/// Delivers relay payloads to the destination.
///
/// Endpoint and credentials are bound when the transport is built.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Makes one delivery attempt.
    async fn deliver(&self, payload: &RelayPayload) -> DeliveryOutcome;
}

#[async_trait]
impl<T: RelayTransport + ?Sized> RelayTransport for Arc<T> {
    async fn deliver(&self, payload: &RelayPayload) -> DeliveryOutcome {
        (**self).deliver(payload).await
    }
}

#[async_trait]
impl RelayTransport for RelayClient {
    async fn deliver(&self, payload: &RelayPayload) -> DeliveryOutcome {
        match self.relay(payload).await {
            Ok(body) => {
                debug!(tx_hash = %payload.source_tx_hash, response = %body, "Relay accepted deposit");
                DeliveryOutcome::Delivered
            }
            Err(e) if e.is_transient() => DeliveryOutcome::TransientFailure(e.to_string()),
            Err(e) => DeliveryOutcome::PermanentFailure(e.to_string()),
        }
    }
}
