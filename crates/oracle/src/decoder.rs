//! Decoding of `BridgeDepositInitiated` logs.

use std::iter;

use alloy_primitives::{B256, keccak256};
use alloy_sol_types::{SolEvent, sol};
use bridge_relay_types::DepositEvent;

use crate::{error::DecodeError, source::RawLog};

sol! {
    /// Emitted by the bridge contract when funds are locked.
    event BridgeDepositInitiated(
        address indexed user,
        address indexed token,
        uint256 amount,
        uint256 destinationChainId
    );
}

/// Canonical signature of the deposit event.
pub const DEPOSIT_EVENT_SIGNATURE: &str = BridgeDepositInitiated::SIGNATURE;

const TOPIC_COUNT: usize = 3;
const DATA_LEN: usize = 64;
const ADDRESS_PADDING: usize = 12;

/// Maps raw logs to [`DepositEvent`]s.
///
/// Layout: `topics = [topic0, user, token]`, `data = amount ++ destinationChainId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDecoder {
    topic0: B256,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self {
            topic0: BridgeDepositInitiated::SIGNATURE_HASH,
        }
    }
}

impl EventDecoder {
    /// Decoder matching logs whose topic0 is `keccak256(signature)`.
    pub fn new(signature: &str) -> Self {
        Self {
            topic0: keccak256(signature.as_bytes()),
        }
    }

    /// Event signature hash expected in topic0.
    pub fn topic(&self) -> B256 {
        self.topic0
    }

    /// Decodes one log entry.
    pub fn decode(&self, log: &RawLog) -> Result<DepositEvent, DecodeError> {
        match log.topics.first() {
            Some(topic) if *topic == self.topic0 => {}
            Some(topic) => {
                return Err(DecodeError::UnexpectedShape(format!(
                    "topic0 {topic} is not the deposit event signature"
                )));
            }
            None => return Err(DecodeError::UnexpectedShape("log has no topics".into())),
        }
        if log.topics.len() != TOPIC_COUNT {
            return Err(DecodeError::UnexpectedShape(format!(
                "expected {TOPIC_COUNT} topics, got {}",
                log.topics.len()
            )));
        }

        check_address_topic("user", &log.topics[1])?;
        check_address_topic("token", &log.topics[2])?;
        if log.data.len() != DATA_LEN {
            return Err(DecodeError::malformed(
                "data",
                format!("expected {DATA_LEN} bytes, got {}", log.data.len()),
            ));
        }

        // A configured signature only renames the event, the layout stays the same.
        let topics = iter::once(BridgeDepositInitiated::SIGNATURE_HASH)
            .chain(log.topics[1..].iter().copied());
        let deposit = BridgeDepositInitiated::decode_raw_log_validate(topics, &log.data)
            .map_err(|e| DecodeError::malformed("data", e.to_string()))?;
        let destination_chain_id = u64::try_from(deposit.destinationChainId)
            .map_err(|_| DecodeError::malformed("destinationChainId", "does not fit in u64"))?;

        let block_number = log
            .block_number
            .ok_or_else(|| DecodeError::malformed("block_number", "missing"))?;
        let source_tx_hash = log
            .transaction_hash
            .ok_or_else(|| DecodeError::malformed("transaction_hash", "missing"))?;
        let log_index = log
            .log_index
            .ok_or_else(|| DecodeError::malformed("log_index", "missing"))?;

        Ok(DepositEvent {
            source_tx_hash,
            block_number,
            log_index,
            depositor: deposit.user,
            token_address: deposit.token,
            amount: deposit.amount,
            destination_chain_id,
        })
    }
}

fn check_address_topic(field: &'static str, topic: &B256) -> Result<(), DecodeError> {
    if topic[..ADDRESS_PADDING].iter().any(|b| *b != 0) {
        return Err(DecodeError::malformed(
            field,
            format!("{topic} is not a left-padded address"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{B256, Bytes, U256, keccak256};

    use crate::{
        decoder::{DEPOSIT_EVENT_SIGNATURE, EventDecoder},
        error::DecodeError,
        test_utils::{deposit_event, deposit_log},
    };

    #[test]
    fn test_default_topic_is_signature_hash() {
        assert_eq!(
            DEPOSIT_EVENT_SIGNATURE,
            "BridgeDepositInitiated(address,address,uint256,uint256)"
        );
        assert_eq!(
            EventDecoder::default(),
            EventDecoder::new(DEPOSIT_EVENT_SIGNATURE)
        );
        assert_eq!(
            EventDecoder::default().topic(),
            keccak256(DEPOSIT_EVENT_SIGNATURE)
        );
    }

    #[test]
    fn test_decode_well_formed_log() {
        let event = EventDecoder::default().decode(&deposit_log(100, 3)).unwrap();
        assert_eq!(event, deposit_event(100, 3));
    }

    #[test]
    fn test_decode_with_configured_signature() {
        let decoder = EventDecoder::new("VaultDeposit(address,address,uint256,uint256)");
        let mut log = deposit_log(100, 3);
        log.topics[0] = decoder.topic();

        assert_eq!(decoder.decode(&log).unwrap(), deposit_event(100, 3));
    }

    #[test]
    fn test_decode_max_amount() {
        let mut log = deposit_log(100, 0);
        let mut data = log.data.to_vec();
        data[..32].copy_from_slice(&U256::MAX.to_be_bytes::<32>());
        log.data = Bytes::from(data);

        let event = EventDecoder::default().decode(&log).unwrap();

        assert_eq!(event.amount, U256::MAX);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoder = EventDecoder::default();
        let batch = vec![deposit_log(100, 0), deposit_log(100, 1), deposit_log(101, 0)];

        let first: Vec<_> = batch.iter().map(|log| decoder.decode(log)).collect();
        let second: Vec<_> = batch.iter().map(|log| decoder.decode(log)).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_rejects_foreign_event() {
        let mut log = deposit_log(100, 0);
        log.topics[0] = keccak256("Transfer(address,address,uint256)");

        assert!(matches!(
            EventDecoder::default().decode(&log),
            Err(DecodeError::UnexpectedShape(_))
        ));

        let other = EventDecoder::new("OtherDeposit(address,address,uint256,uint256)");
        assert!(matches!(
            other.decode(&deposit_log(100, 0)),
            Err(DecodeError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_topic_count() {
        let decoder = EventDecoder::default();

        let mut missing = deposit_log(100, 0);
        missing.topics.pop();
        assert!(matches!(
            decoder.decode(&missing),
            Err(DecodeError::UnexpectedShape(_))
        ));

        let mut extra = deposit_log(100, 0);
        extra.topics.push(B256::ZERO);
        assert!(matches!(
            decoder.decode(&extra),
            Err(DecodeError::UnexpectedShape(_))
        ));

        let empty = crate::source::RawLog::default();
        assert!(matches!(
            decoder.decode(&empty),
            Err(DecodeError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unpadded_address_topic() {
        let mut log = deposit_log(100, 0);
        log.topics[2] = B256::repeat_byte(0xff);

        assert!(matches!(
            EventDecoder::default().decode(&log),
            Err(DecodeError::MalformedField { field: "token", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_data_length() {
        let decoder = EventDecoder::default();

        for len in [0, 31, 63, 65, 96] {
            let mut log = deposit_log(100, 0);
            log.data = Bytes::from(vec![0u8; len]);
            assert!(
                matches!(
                    decoder.decode(&log),
                    Err(DecodeError::MalformedField { field: "data", .. })
                ),
                "data length {len}"
            );
        }
    }

    #[test]
    fn test_decode_rejects_oversized_chain_id() {
        let mut log = deposit_log(100, 0);
        let mut data = log.data.to_vec();
        data[32..].copy_from_slice(&(U256::from(u64::MAX) + U256::from(1)).to_be_bytes::<32>());
        log.data = Bytes::from(data);

        assert!(matches!(
            EventDecoder::default().decode(&log),
            Err(DecodeError::MalformedField {
                field: "destinationChainId",
                ..
            })
        ));
    }

    #[test]
    fn test_decode_rejects_pending_log() {
        let decoder = EventDecoder::default();

        let mut log = deposit_log(100, 0);
        log.block_number = None;
        assert!(matches!(
            decoder.decode(&log),
            Err(DecodeError::MalformedField {
                field: "block_number",
                ..
            })
        ));

        let mut log = deposit_log(100, 0);
        log.transaction_hash = None;
        assert!(matches!(
            decoder.decode(&log),
            Err(DecodeError::MalformedField {
                field: "transaction_hash",
                ..
            })
        ));

        let mut log = deposit_log(100, 0);
        log.log_index = None;
        assert!(matches!(
            decoder.decode(&log),
            Err(DecodeError::MalformedField {
                field: "log_index",
                ..
            })
        ));
    }
}
