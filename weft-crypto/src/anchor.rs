use std::fmt;

use weft_types::primitives::{hash_hex, Hash, Timestamp, HASH_LEN};
use weft_types::transaction::Transaction;

use crate::hash::FieldHasher;

const ANCHOR_DOMAIN: &str = "weft-transaction-anchor-v1";

/// A 48-byte token binding a transaction to the moment it was anchored.
///
/// Not an identifier: two submissions of the same transaction at different
/// timestamps produce different anchors.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionAnchor(Hash);

impl TransactionAnchor {
    /// Derive the anchor for `tx` at `timestamp`.
    ///
    /// Fields are hashed in the order sender, receiver, amount, timestamp,
    /// payload.
    pub fn create(tx: &Transaction, timestamp: Timestamp) -> Self {
        let mut hasher = FieldHasher::new(ANCHOR_DOMAIN);
        hasher
            .str(tx.sender())
            .str(tx.receiver())
            .u128(tx.amount())
            .u64(timestamp)
            .bytes(tx.payload());
        Self(hasher.finish())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; HASH_LEN] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hash_hex(&self.0)
    }
}

impl fmt::Debug for TransactionAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionAnchor({})", self.to_hex())
    }
}

impl fmt::Display for TransactionAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
