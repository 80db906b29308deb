use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::primitives::Hash;

/// One data or parity symbol of an erasure-coded block payload.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EncodedChunk {
    /// Segment this symbol belongs to.
    pub segment: u16,
    /// Position within the segment codeword. Indices below the segment's data
    /// symbol count are data; the rest are parity.
    pub index: u16,
    /// Length of the original payload, before padding.
    pub payload_len: u64,
    pub data: Vec<u8>,
    /// Digest over the position, payload length and data. A chunk whose
    /// digest does not match is treated as lost.
    #[serde(with = "crate::primitives::serde_hash")]
    pub digest: Hash,
}
