use weft_crypto::hash::FieldHasher;
use weft_types::primitives::*;
use weft_types::weave::Block;

use crate::error::WeaveError;

const BLOCK_HASH_DOMAIN: &str = "weft-block-v1";

/// Borsh size of a block with no transactions: height, three hashes, and
/// the transaction vector's length prefix.
pub const EMPTY_BLOCK_SIZE: usize = 8 + 3 * HASH_LEN + 4;

/// Compute the block hash over (height, prev_hash, old_block_ref,
/// transactions). The hash field itself is excluded.
pub fn compute_block_hash(
    height: Height,
    prev_hash: &Hash,
    old_block_ref: &Hash,
    transactions: &[TxId],
) -> Hash {
    let mut hasher = FieldHasher::new(BLOCK_HASH_DOMAIN);
    hasher
        .u64(height)
        .hash(prev_hash)
        .hash(old_block_ref)
        .u64(transactions.len() as u64);
    for tx_id in transactions {
        hasher.str(tx_id);
    }
    hasher.finish()
}

/// Build a block and fill in its hash.
pub fn build_block(
    height: Height,
    prev_hash: Hash,
    transactions: Vec<TxId>,
    old_block_ref: Hash,
) -> Block {
    let hash = compute_block_hash(height, &prev_hash, &old_block_ref, &transactions);
    Block {
        height,
        hash,
        prev_hash,
        transactions,
        old_block_ref,
    }
}

/// The genesis block: height 0 with zero predecessor and back-reference.
pub fn genesis_block(transactions: Vec<TxId>) -> Block {
    build_block(0, ZERO_HASH, transactions, ZERO_HASH)
}

/// Check that a block's hash matches its contents.
pub fn verify_block_hash(block: &Block) -> Result<(), WeaveError> {
    let expected = compute_block_hash(
        block.height,
        &block.prev_hash,
        &block.old_block_ref,
        &block.transactions,
    );
    if expected != block.hash {
        return Err(WeaveError::InvalidBlock {
            reason: format!(
                "hash mismatch: claimed {}, computed {}",
                short_hex(&block.hash),
                short_hex(&expected)
            ),
        });
    }
    Ok(())
}

/// Borsh size a transaction id adds to a block.
pub fn tx_id_size(tx_id: &str) -> usize {
    4 + tx_id.len()
}

/// Borsh-encoded size of a block.
pub fn serialized_size(block: &Block) -> usize {
    EMPTY_BLOCK_SIZE + block.transactions.iter().map(|t| tx_id_size(t)).sum::<usize>()
}
