use borsh::BorshDeserialize;
use weft_types::transaction::Utxo;

use crate::error::StorageError;
use crate::traits::{BatchOp, KvStore};

const UTXO_PREFIX: &[u8] = b"utxo:";

/// Persistence for the unspent-output set, keyed by `"tx_id:output_index"`.
pub struct UtxoStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> UtxoStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load every persisted UTXO.
    pub fn load_all(&self) -> Result<Vec<Utxo>, StorageError> {
        self.store
            .prefix_scan(UTXO_PREFIX)?
            .into_iter()
            .map(|(_, value)| {
                Utxo::try_from_slice(&value).map_err(|e| StorageError::DeserializationError {
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    pub fn insert_op(utxo: &Utxo) -> Result<BatchOp, StorageError> {
        let value = borsh::to_vec(utxo).map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })?;
        Ok(BatchOp::Put {
            key: utxo_key(&utxo.key()),
            value,
        })
    }

    pub fn delete_op(ledger_key: &str) -> BatchOp {
        BatchOp::Delete {
            key: utxo_key(ledger_key),
        }
    }
}

fn utxo_key(ledger_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(UTXO_PREFIX.len() + ledger_key.len());
    key.extend_from_slice(UTXO_PREFIX);
    key.extend_from_slice(ledger_key.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::traits::BatchWriter;

    type Store = UtxoStore<MemoryStore>;

    #[test]
    fn test_insert_and_load() {
        let backend = MemoryStore::new();
        let a = Utxo::new("TX0001", 0, 150, "alice");
        let b = Utxo::new("TX0002", 1, 75, "bob");
        backend
            .write_batch(vec![
                Store::insert_op(&b).unwrap(),
                Store::insert_op(&a).unwrap(),
            ])
            .unwrap();

        let loaded = UtxoStore::new(backend).load_all().unwrap();
        assert_eq!(loaded, vec![a, b]);
    }

    #[test]
    fn test_delete_op_removes_utxo() {
        let backend = MemoryStore::new();
        let a = Utxo::new("TX0001", 0, 150, "alice");
        backend.write_batch(vec![Store::insert_op(&a).unwrap()]).unwrap();
        backend.write_batch(vec![Store::delete_op("TX0001:0")]).unwrap();
        assert!(UtxoStore::new(backend).load_all().unwrap().is_empty());
    }

    #[test]
    fn test_load_ignores_other_prefixes() {
        let backend = MemoryStore::new();
        backend.put(b"weave:state", b"not a utxo").unwrap();
        assert!(UtxoStore::new(backend).load_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_utxo_value() {
        let backend = MemoryStore::new();
        backend.put(b"utxo:TX1:0", &[0xff]).unwrap();
        assert!(matches!(
            UtxoStore::new(backend).load_all(),
            Err(StorageError::DeserializationError { .. })
        ));
    }
}
