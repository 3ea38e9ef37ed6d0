//! Shared type definitions for the bridge deposit oracle.
//!
//! This crate provides the deposit record extracted from the source ledger and the JSON
//! payload posted to the destination relay endpoint, used by both the oracle and the relay
//! client.
//!
//! ## Overview
//!
//! - [`DepositEvent`] - A decoded `BridgeDepositInitiated` log
//! - [`EventKey`] - The identity of one log inside a continuous run
//! - [`RelayPayload`] - The body sent to the relay endpoint
//!
//! Token amounts are 256-bit integers and are serialized as decimal strings, so that JSON
//! consumers without big-integer support do not lose precision.

use std::fmt;

pub use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A deposit locked on the source ledger, decoded from one log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepositEvent {
    /// Hash of the transaction that emitted the log.
    pub source_tx_hash: B256,
    /// Block that contains the transaction.
    pub block_number: u64,
    /// Position of the log inside its block.
    pub log_index: u64,
    /// Account that locked the funds.
    pub depositor: Address,
    /// Token contract of the locked funds.
    pub token_address: Address,
    /// Locked amount in the token's base unit.
    pub amount: U256,
    /// Chain the funds should be released on.
    pub destination_chain_id: u64,
}

impl DepositEvent {
    /// Returns the key that identifies this event within a run.
    pub fn key(&self) -> EventKey {
        EventKey {
            block_number: self.block_number,
            log_index: self.log_index,
            tx_hash: self.source_tx_hash,
        }
    }
}

/// Identity of a log entry.
///
/// Ordered by `(block_number, log_index)` first, which is the order events are relayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: B256,
}

impl EventKey {
    /// Smallest key inside `block_number`.
    pub fn block_start(block_number: u64) -> Self {
        Self {
            block_number,
            log_index: 0,
            tx_hash: B256::ZERO,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.block_number, self.log_index, self.tx_hash)
    }
}

/// Request body posted to the destination relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    /// Hash of the originating transaction, `0x`-prefixed hex.
    pub source_tx_hash: B256,
    /// Chain the deposit was observed on.
    pub source_chain_id: u64,
    /// Chain the funds should be released on.
    pub destination_chain_id: u64,
    /// Depositor address.
    pub user: Address,
    /// Token contract address.
    pub token: Address,
    /// Amount as a decimal string.
    pub amount: String,
    /// Block of the originating transaction.
    pub block_number: u64,
    /// Position of the log inside its block.
    pub log_index: u64,
}

impl RelayPayload {
    /// Builds the payload for `event` observed on `source_chain_id`.
    pub fn new(event: &DepositEvent, source_chain_id: u64) -> Self {
        Self {
            source_tx_hash: event.source_tx_hash,
            source_chain_id,
            destination_chain_id: event.destination_chain_id,
            user: event.depositor,
            token: event.token_address,
            amount: event.amount.to_string(),
            block_number: event.block_number,
            log_index: event.log_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{U256, address, b256};

    use crate::{DepositEvent, EventKey, RelayPayload};

    fn sample_event() -> DepositEvent {
        DepositEvent {
            source_tx_hash: b256!(
                "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"
            ),
            block_number: 100,
            log_index: 3,
            depositor: address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            token_address: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            amount: U256::MAX,
            destination_chain_id: 137,
        }
    }

    #[test]
    fn test_payload_serializes_amount_as_decimal_string() {
        let payload = RelayPayload::new(&sample_event(), 1);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["amount"], U256::MAX.to_string());
        assert_eq!(json["source_chain_id"], 1);
        assert_eq!(json["destination_chain_id"], 137);
        assert_eq!(json["block_number"], 100);
        assert_eq!(
            json["source_tx_hash"],
            "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"
        );
        assert_eq!(
            json["user"].as_str().unwrap().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_event_keys_order_by_block_then_log_index() {
        let event = sample_event();
        let earlier_log = DepositEvent {
            log_index: 1,
            source_tx_hash: b256!(
                "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
            ),
            ..event.clone()
        };
        let next_block = DepositEvent {
            block_number: 101,
            log_index: 0,
            ..event.clone()
        };

        let mut keys = vec![next_block.key(), event.key(), earlier_log.key()];
        keys.sort();

        assert_eq!(keys, vec![earlier_log.key(), event.key(), next_block.key()]);
        assert!(EventKey::block_start(100) < earlier_log.key());
        assert!(EventKey::block_start(101) > event.key());
    }
}
