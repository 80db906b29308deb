use std::collections::{BTreeMap, HashSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use weft_crypto::merkle::{MerkleProof, MerkleTree};
use weft_types::primitives::{Hash, OutPoint};
use weft_types::transaction::Utxo;

use crate::error::WeaveError;

/// The UTXO changes paired with one block: outputs spent and outputs created.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct LedgerUpdate {
    pub spent: Vec<OutPoint>,
    pub created: Vec<Utxo>,
}

impl LedgerUpdate {
    pub fn is_empty(&self) -> bool {
        self.spent.is_empty() && self.created.is_empty()
    }
}

/// The set of unspent outputs with a Merkle accumulator over its sorted keys.
///
/// The tree is rebuilt from the full key set after every mutation, so its
/// root depends only on membership and never on insertion order. That rebuild
/// is O(n) per change, as is locating a key's leaf in [`UtxoLedger::prove`];
/// both are the known scaling limits of this ledger.
#[derive(Debug, Clone)]
pub struct UtxoLedger {
    utxos: BTreeMap<String, Utxo>,
    tree: MerkleTree,
}

impl Default for UtxoLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl UtxoLedger {
    pub fn new() -> Self {
        let empty: [&[u8]; 0] = [];
        Self {
            utxos: BTreeMap::new(),
            tree: MerkleTree::from_leaves(&empty),
        }
    }

    /// Rebuild a ledger from persisted outputs.
    pub fn from_utxos(utxos: Vec<Utxo>) -> Result<Self, WeaveError> {
        let mut ledger = Self::new();
        ledger.add_outputs(utxos)?;
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn get(&self, tx_id: &str, output_index: u32) -> Option<&Utxo> {
        self.utxos.get(&ledger_key(tx_id, output_index))
    }

    /// All unspent outputs in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.utxos.values()
    }

    /// Insert a batch of outputs. A key already present, or repeated within
    /// the batch, rejects the whole batch.
    pub fn add_outputs(&mut self, utxos: Vec<Utxo>) -> Result<(), WeaveError> {
        self.apply(LedgerUpdate {
            spent: Vec::new(),
            created: utxos,
        })?;
        Ok(())
    }

    /// Whether the output exists and is unspent.
    pub fn verify_input(&self, tx_id: &str, output_index: u32) -> bool {
        self.utxos.contains_key(&ledger_key(tx_id, output_index))
    }

    /// Root of the accumulator over the current key set.
    pub fn merkle_root(&self) -> Result<Hash, WeaveError> {
        self.tree.root().ok_or(WeaveError::EmptyLedger)
    }

    /// Remove and return an unspent output.
    pub fn consume(&mut self, tx_id: &str, output_index: u32) -> Result<Utxo, WeaveError> {
        let key = ledger_key(tx_id, output_index);
        let utxo = self
            .utxos
            .remove(&key)
            .ok_or(WeaveError::UnknownOutput { key })?;
        self.rebuild();
        Ok(utxo)
    }

    /// Check an update against the current set without mutating it.
    ///
    /// Spent outpoints must exist and be distinct. Created outputs must be
    /// distinct and absent from the current set.
    pub fn check_update(&self, update: &LedgerUpdate) -> Result<(), WeaveError> {
        let mut spent = HashSet::with_capacity(update.spent.len());
        for outpoint in &update.spent {
            let key = outpoint.key();
            if !self.utxos.contains_key(&key) {
                return Err(WeaveError::UnknownOutput { key });
            }
            if !spent.insert(key.clone()) {
                return Err(WeaveError::DuplicateOutput { key });
            }
        }

        let mut created = HashSet::with_capacity(update.created.len());
        for utxo in &update.created {
            let key = utxo.key();
            if self.utxos.contains_key(&key) || !created.insert(key.clone()) {
                return Err(WeaveError::DuplicateOutput { key });
            }
        }
        Ok(())
    }

    /// Validate and apply an update as a unit. Returns the new root, or
    /// `None` when the set is left empty.
    pub fn apply(&mut self, update: LedgerUpdate) -> Result<Option<Hash>, WeaveError> {
        self.check_update(&update)?;
        for outpoint in &update.spent {
            self.utxos.remove(&outpoint.key());
        }
        for utxo in update.created {
            self.utxos.insert(utxo.key(), utxo);
        }
        self.rebuild();
        tracing::debug!(utxos = self.utxos.len(), "ledger updated");
        Ok(self.tree.root())
    }

    /// Inclusion proof for an unspent output against the current root.
    ///
    /// Finds the leaf index with a linear scan of the sorted keys.
    pub fn prove(&self, tx_id: &str, output_index: u32) -> Result<MerkleProof, WeaveError> {
        let key = ledger_key(tx_id, output_index);
        let index = self
            .utxos
            .keys()
            .position(|k| *k == key)
            .ok_or_else(|| WeaveError::UnknownOutput { key: key.clone() })?;
        self.tree
            .prove(index)
            .ok_or(WeaveError::UnknownOutput { key })
    }

    /// Verify that the ledger key `"tx_id:output_index"` is included under `root`.
    pub fn verify_proof(
        root: &Hash,
        tx_id: &str,
        output_index: u32,
        proof: &MerkleProof,
    ) -> Result<(), WeaveError> {
        let key = ledger_key(tx_id, output_index);
        MerkleTree::verify_proof(root, key.as_bytes(), proof)?;
        Ok(())
    }

    fn rebuild(&mut self) {
        let keys: Vec<&String> = self.utxos.keys().collect();
        self.tree = MerkleTree::from_leaves(&keys);
    }
}

fn ledger_key(tx_id: &str, output_index: u32) -> String {
    format!("{}:{}", tx_id, output_index)
}
