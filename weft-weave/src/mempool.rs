use std::collections::{HashSet, VecDeque};

use weft_types::primitives::TxId;
use weft_types::transaction::BlockTransaction;

use crate::error::WeaveError;

/// Pending transactions awaiting inclusion, in arrival order.
pub struct Mempool {
    pending: VecDeque<BlockTransaction>,
    /// Ids currently queued, for duplicate detection.
    known: HashSet<TxId>,
    max_size: usize,
}

impl Mempool {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            known: HashSet::new(),
            max_size,
        }
    }

    /// Queue a transaction after a shape check.
    pub fn add(&mut self, tx: BlockTransaction) -> Result<(), WeaveError> {
        tx.check_shape()?;
        if self.known.contains(&tx.id) {
            return Err(WeaveError::DuplicateTransaction { tx_id: tx.id });
        }
        if self.pending.len() >= self.max_size {
            return Err(WeaveError::MempoolFull);
        }
        self.known.insert(tx.id.clone());
        self.pending.push_back(tx);
        Ok(())
    }

    /// Number of pending transactions. This is the `pending` load signal.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.known.contains(tx_id)
    }

    /// Take every pending transaction, oldest first.
    pub fn drain(&mut self) -> Vec<BlockTransaction> {
        self.known.clear();
        self.pending.drain(..).collect()
    }

    /// Put transactions that did not fit back at the front, preserving their
    /// order ahead of anything added since the drain.
    pub fn requeue(&mut self, txs: Vec<BlockTransaction>) {
        for tx in txs.into_iter().rev() {
            if self.known.insert(tx.id.clone()) {
                self.pending.push_front(tx);
            }
        }
    }
}
