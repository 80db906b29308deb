use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::primitives::*;

/// A block in the weave.
///
/// `prev_hash` links to the direct predecessor; `old_block_ref` is the
/// Proof-of-Access back-reference and may name any previously stored block.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Block {
    pub height: Height,
    /// SHA-384 over (height, prev_hash, old_block_ref, transactions).
    #[serde(with = "crate::primitives::serde_hash")]
    pub hash: Hash,
    #[serde(with = "crate::primitives::serde_hash")]
    pub prev_hash: Hash,
    /// Ordered transaction identifiers.
    pub transactions: Vec<TxId>,
    #[serde(with = "crate::primitives::serde_hash")]
    pub old_block_ref: Hash,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// Summary of the weave tip, persisted alongside blocks.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct WeaveState {
    /// Number of blocks in the chain, genesis included.
    pub chain_len: u64,
    #[serde(with = "crate::primitives::serde_hash")]
    pub latest_hash: Hash,
    /// Transactions in the most recently admitted block.
    pub last_confirmed: u64,
}
