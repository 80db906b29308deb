use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Length in bytes of every digest in the weave (SHA-384).
pub const HASH_LEN: usize = 48;

/// 48-byte SHA-384 digest.
pub type Hash = [u8; HASH_LEN];

/// The all-zero hash, used as `prev_hash` / `old_block_ref` of genesis.
pub const ZERO_HASH: Hash = [0u8; HASH_LEN];

/// Transaction identifier, assigned by the submitter.
pub type TxId = String;

/// Account identifier (sender, receiver, UTXO owner).
pub type Address = String;

/// Amount in base units. One whole token is `10^AMOUNT_DECIMALS` base units.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Block height; genesis is 0.
pub type Height = u64;

/// Render a hash as lowercase hex.
pub fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Short hex prefix for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

/// Reference to one output of a transaction.
///
/// Its display form `"tx_id:output_index"` is the ledger key; keys sort
/// lexicographically on that string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize, Serialize,
    Deserialize,
)]
pub struct OutPoint {
    pub tx_id: TxId,
    pub output_index: u32,
}

impl OutPoint {
    pub fn new(tx_id: impl Into<TxId>, output_index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
        }
    }

    /// The ledger key for this outpoint.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// Serde helper for [u8; 48] fields.
pub mod serde_hash {
    use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

    use super::{Hash, HASH_LEN};

    pub fn serialize<S>(value: &Hash, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Hash, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Vec<u8> = Vec::deserialize(deserializer)?;
        v.try_into().map_err(|_| {
            serde::de::Error::custom(format!("expected {} bytes for hash", HASH_LEN))
        })
    }
}
