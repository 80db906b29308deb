use borsh::BorshDeserialize;
use weft_types::primitives::{Hash, HASH_LEN};
use weft_types::weave::{Block, WeaveState};

use crate::error::StorageError;
use crate::traits::{BatchOp, KvStore};

const BLOCK_HASH_PREFIX: &[u8] = b"weave:block:hash:";
const CHAIN_POSITION_PREFIX: &[u8] = b"weave:chain:";
const WEAVE_STATE_KEY: &[u8] = b"weave:state";

/// The historical block store: every admitted block, keyed by its hash.
///
/// Append-only. Alongside the hash index it records each block's position in
/// the admission order so the chain can be replayed after a restart.
#[derive(Clone)]
pub struct HistoricalStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> HistoricalStore<S> {
    /// Create a new HistoricalStore wrapping the given KvStore.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether a block with this hash has been stored. This is the
    /// Proof-of-Access lookup.
    pub fn contains(&self, hash: &Hash) -> Result<bool, StorageError> {
        self.store.contains(&hash_key(hash))
    }

    /// Load a block by its hash.
    pub fn get(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        match self.store.get(&hash_key(hash))? {
            Some(bytes) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load the global weave state.
    pub fn load_weave_state(&self) -> Result<Option<WeaveState>, StorageError> {
        match self.store.get(WEAVE_STATE_KEY)? {
            Some(bytes) => {
                let state = WeaveState::try_from_slice(&bytes).map_err(|e| {
                    StorageError::DeserializationError {
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Replay the chain in admission order.
    pub fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        let entries = self.store.prefix_scan(CHAIN_POSITION_PREFIX)?;
        let mut chain = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let hash: Hash = value.as_slice().try_into().map_err(|_| StorageError::Corrupt {
                reason: format!("chain entry {:?} does not hold a hash", key),
            })?;
            let block = self.get(&hash)?.ok_or_else(|| StorageError::Corrupt {
                reason: "chain references a block missing from the hash index".to_string(),
            })?;
            chain.push(block);
        }
        Ok(chain)
    }

    /// Batch ops that record `block` at chain position `position` and update
    /// the tip state. Nothing is written until the caller commits the batch.
    pub fn block_ops(
        block: &Block,
        position: u64,
        state: &WeaveState,
    ) -> Result<Vec<BatchOp>, StorageError> {
        let value = borsh::to_vec(block).map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })?;
        let state_value = borsh::to_vec(state).map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })?;
        Ok(vec![
            BatchOp::Put {
                key: hash_key(&block.hash),
                value,
            },
            BatchOp::Put {
                key: position_key(position),
                value: block.hash.to_vec(),
            },
            BatchOp::Put {
                key: WEAVE_STATE_KEY.to_vec(),
                value: state_value,
            },
        ])
    }
}

fn hash_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(BLOCK_HASH_PREFIX.len() + HASH_LEN);
    key.extend_from_slice(BLOCK_HASH_PREFIX);
    key.extend_from_slice(hash);
    key
}

fn position_key(position: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(CHAIN_POSITION_PREFIX.len() + std::mem::size_of::<u64>());
    key.extend_from_slice(CHAIN_POSITION_PREFIX);
    // Big-endian so that byte order matches numeric order in prefix scans.
    key.extend_from_slice(&position.to_be_bytes());
    key
}

fn decode_block(bytes: &[u8]) -> Result<Block, StorageError> {
    Block::try_from_slice(bytes).map_err(|e| StorageError::DeserializationError {
        reason: e.to_string(),
    })
}
