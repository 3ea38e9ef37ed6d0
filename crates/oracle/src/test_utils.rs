//! Deposit log fixtures shared by the unit tests.

use alloy_primitives::{Address, B256, Bytes, U256, address, keccak256};
use bridge_relay_types::DepositEvent;

use crate::{decoder::EventDecoder, source::RawLog};

pub(crate) const BRIDGE: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub(crate) const DEPOSITOR: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub(crate) const TOKEN: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
pub(crate) const DESTINATION_CHAIN_ID: u64 = 137;

pub(crate) fn tx_hash(block_number: u64, log_index: u64) -> B256 {
    keccak256(format!("deposit-{block_number}-{log_index}"))
}

pub(crate) fn amount(block_number: u64, log_index: u64) -> U256 {
    U256::from(block_number) * U256::from(10u64).pow(U256::from(18)) + U256::from(log_index)
}

/// Well-formed `BridgeDepositInitiated` log at `(block_number, log_index)`.
pub(crate) fn deposit_log(block_number: u64, log_index: u64) -> RawLog {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&amount(block_number, log_index).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(DESTINATION_CHAIN_ID).to_be_bytes::<32>());

    RawLog {
        address: BRIDGE,
        topics: vec![
            EventDecoder::default().topic(),
            DEPOSITOR.into_word(),
            TOKEN.into_word(),
        ],
        data: Bytes::from(data),
        block_number: Some(block_number),
        transaction_hash: Some(tx_hash(block_number, log_index)),
        log_index: Some(log_index),
    }
}

/// The event [`deposit_log`] decodes to.
pub(crate) fn deposit_event(block_number: u64, log_index: u64) -> DepositEvent {
    DepositEvent {
        source_tx_hash: tx_hash(block_number, log_index),
        block_number,
        log_index,
        depositor: DEPOSITOR,
        token_address: TOKEN,
        amount: amount(block_number, log_index),
        destination_chain_id: DESTINATION_CHAIN_ID,
    }
}
