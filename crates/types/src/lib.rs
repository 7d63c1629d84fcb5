mod constants;

pub use constants::*;

use chrono::{DateTime, Utc};

pub type ChainId = u16;
pub type Sequence = u64;

pub type TxHash = [u8; constants::transaction::TX_HASH_SIZE];
pub type EmitterAddress = [u8; constants::address::EMITTER_ADDRESS_SIZE];

pub const ZERO_EMITTER_ADDRESS: EmitterAddress = constants::address::ZERO_EMITTER_ADDRESS;

/// Derives the placeholder transaction hash for an event.
///
/// The node's event API does not expose the emitting transaction, so the
/// sequence number is written big-endian into the last eight bytes of an
/// otherwise zeroed hash. Distinct sequences always give distinct hashes.
pub fn tx_hash_from_sequence(sequence: Sequence) -> TxHash {
    let mut hash = [0u8; constants::transaction::TX_HASH_SIZE];
    let offset = hash.len() - constants::transaction::ENCODED_SEQUENCE_SIZE;
    hash[offset..].copy_from_slice(&sequence.to_be_bytes());
    hash
}

/// A cross-chain message observed on the watched account, ready for signing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Publication {
    pub tx_hash: TxHash,
    pub timestamp: DateTime<Utc>,
    pub nonce: u32,
    pub sequence: Sequence,
    pub emitter_chain: ChainId,
    pub emitter_address: EmitterAddress,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    pub consistency_level: u8,
}

/// Request from the network to look at one event again.
///
/// `tx_hash` carries the sequence number big-endian, matching the hash the
/// watcher hands out in [`Publication::tx_hash`] minus its zero padding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObservationRequest {
    pub chain_id: ChainId,
    #[serde(with = "serde_bytes")]
    pub tx_hash: Vec<u8>,
}

impl ObservationRequest {
    pub fn for_sequence(chain_id: ChainId, sequence: Sequence) -> Self {
        Self {
            chain_id,
            tx_hash: sequence.to_be_bytes().to_vec(),
        }
    }

    /// Returns `None` unless the encoded sequence is exactly eight bytes.
    pub fn sequence(&self) -> Option<Sequence> {
        let bytes: [u8; constants::transaction::ENCODED_SEQUENCE_SIZE] =
            self.tx_hash.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

/// Per-chain entry gossiped in heartbeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NetworkStats {
    pub height: i64,
    pub contract_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_is_right_aligned_big_endian() {
        let hash = tx_hash_from_sequence(0x0102_0304_0506_0708);
        assert_eq!(&hash[..24], &[0u8; 24]);
        assert_eq!(&hash[24..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_tx_hash_is_stable_and_distinct() {
        assert_eq!(tx_hash_from_sequence(42), tx_hash_from_sequence(42));
        assert_ne!(tx_hash_from_sequence(42), tx_hash_from_sequence(43));
        assert_ne!(tx_hash_from_sequence(0), tx_hash_from_sequence(u64::MAX));
        assert_eq!(tx_hash_from_sequence(0), [0u8; 32]);
    }

    #[test]
    fn test_observation_request_sequence_round_trip() {
        let request = ObservationRequest::for_sequence(chain_ids::APTOS, 6);
        assert_eq!(request.tx_hash, vec![0, 0, 0, 0, 0, 0, 0, 6]);
        assert_eq!(request.sequence(), Some(6));
    }

    #[test]
    fn test_observation_request_rejects_wrong_width() {
        let short = ObservationRequest {
            chain_id: chain_ids::APTOS,
            tx_hash: vec![0, 6],
        };
        assert_eq!(short.sequence(), None);

        let long = ObservationRequest {
            chain_id: chain_ids::APTOS,
            tx_hash: tx_hash_from_sequence(6).to_vec(),
        };
        assert_eq!(long.sequence(), None);
    }
}
