use std::collections::HashSet;
use std::sync::Arc;

use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use weft_relay::transport::{ErasureConfig, ErasureTransport};
use weft_storage::error::StorageError;
use weft_storage::historical_store::HistoricalStore;
use weft_storage::memory::MemoryStore;
use weft_storage::traits::{BatchWriter, KvStore};
use weft_storage::utxo_store::UtxoStore;
use weft_types::chunk::EncodedChunk;
use weft_types::error::WeftError;
use weft_types::primitives::*;
use weft_types::transaction::{BlockTransaction, Utxo};
use weft_types::weave::{Block, WeaveState};

use crate::block::{self, EMPTY_BLOCK_SIZE};
use crate::capacity::{CapacityConfig, CapacityController};
use crate::error::WeaveError;
use crate::utxo::{LedgerUpdate, UtxoLedger};

/// Configuration for a [`ConsensusEngine`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub capacity: CapacityConfig,
    #[serde(default)]
    pub erasure: ErasureConfig,
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub hash: Hash,
    pub height: Height,
    /// Chain length after the admission, genesis included.
    pub chain_len: u64,
    /// UTXO root after the paired ledger update, `None` if the set is empty.
    pub utxo_root: Option<Hash>,
}

/// A block assembled from candidate transactions, with its ledger mutation.
#[derive(Debug)]
pub struct Proposal {
    pub block: Block,
    pub update: LedgerUpdate,
    /// Transactions included in `block`, in block order.
    pub included: Vec<BlockTransaction>,
    /// Valid transactions that did not fit under the byte limit.
    pub deferred: Vec<BlockTransaction>,
    /// Transactions dropped for spending unknown or already-spent outputs.
    pub dropped: Vec<(TxId, WeaveError)>,
}

/// Read-only Proof-of-Access check against the historical store.
///
/// Cheap to clone; each clone shares the underlying store, so validators can
/// run on other threads while the engine admits blocks.
#[derive(Clone)]
pub struct AccessValidator<S: KvStore> {
    historical: HistoricalStore<S>,
}

impl<S: KvStore> AccessValidator<S> {
    pub fn new(store: S) -> Self {
        Self {
            historical: HistoricalStore::new(store),
        }
    }

    /// Whether `block.old_block_ref` names a stored block.
    pub fn check(&self, block: &Block) -> Result<bool, WeaveError> {
        Ok(self.historical.contains(&block.old_block_ref)?)
    }

    /// [`check`](Self::check), with storage faults counted as a failed
    /// validation.
    pub fn validate(&self, block: &Block) -> bool {
        match self.check(block) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    height = block.height,
                    hash = %short_hex(&block.hash),
                    "proof-of-access lookup failed: {}",
                    e
                );
                false
            }
        }
    }

    /// Whether a block with this hash is already stored.
    pub fn is_stored(&self, hash: &Hash) -> Result<bool, WeaveError> {
        Ok(self.historical.contains(hash)?)
    }
}

/// Admits blocks into the weave.
///
/// A block is admitted only if its `old_block_ref` is already in the
/// historical store. Admission writes the block, its chain position, the tip
/// state, and any paired UTXO changes in one storage batch, then updates the
/// in-memory chain and ledger. A rejected block leaves everything untouched.
pub struct ConsensusEngine<S: BatchWriter + Clone> {
    store: S,
    validator: AccessValidator<S>,
    /// Admitted blocks in admission order; `chain[0]` is genesis.
    chain: Vec<Block>,
    ledger: UtxoLedger,
    capacity: CapacityController,
    transport: ErasureTransport,
    /// Transactions in the most recently admitted block.
    last_confirmed: u64,
}

impl ConsensusEngine<Arc<MemoryStore>> {
    /// An engine over a fresh in-memory store.
    pub fn in_memory(config: EngineConfig) -> Result<Self, WeaveError> {
        Self::open(Arc::new(MemoryStore::new()), config)
    }
}

impl<S: BatchWriter + Clone> ConsensusEngine<S> {
    /// Open an engine over `store`, replaying any chain and UTXO set already
    /// persisted there.
    pub fn open(store: S, config: EngineConfig) -> Result<Self, WeaveError> {
        let capacity = CapacityController::new(config.capacity)?;
        let transport = ErasureTransport::new(config.erasure)?;

        let historical = HistoricalStore::new(store.clone());
        let chain = historical.load_chain()?;
        let last_confirmed = match historical.load_weave_state()? {
            Some(state) => {
                if state.chain_len != chain.len() as u64 {
                    return Err(StorageError::Corrupt {
                        reason: format!(
                            "weave state records {} blocks, chain index holds {}",
                            state.chain_len,
                            chain.len()
                        ),
                    }
                    .into());
                }
                state.last_confirmed
            }
            None => 0,
        };
        let ledger = UtxoLedger::from_utxos(UtxoStore::new(store.clone()).load_all()?)?;

        if !chain.is_empty() {
            tracing::info!(
                chain_len = chain.len(),
                utxos = ledger.len(),
                "recovered weave from store"
            );
        }

        Ok(Self {
            validator: AccessValidator::new(store.clone()),
            store,
            chain,
            ledger,
            capacity,
            transport,
            last_confirmed,
        })
    }

    /// Store the genesis block and its initial outputs. Genesis is the only
    /// block admitted without a Proof-of-Access check.
    pub fn insert_genesis(
        &mut self,
        genesis: Block,
        premine: Vec<Utxo>,
    ) -> Result<Admission, WeaveError> {
        if !self.chain.is_empty() {
            return Err(WeaveError::InvalidBlock {
                reason: "genesis already present".to_string(),
            });
        }
        if !genesis.is_genesis() {
            return Err(WeaveError::InvalidBlock {
                reason: format!("genesis must have height 0, got {}", genesis.height),
            });
        }
        block::verify_block_hash(&genesis)?;
        self.commit(
            genesis,
            LedgerUpdate {
                spent: Vec::new(),
                created: premine,
            },
        )
    }

    /// Proof-of-Access: whether the block's back-reference is stored.
    pub fn validate(&self, block: &Block) -> bool {
        self.validator.validate(block)
    }

    /// A validation handle that can be used from other threads.
    pub fn validator(&self) -> AccessValidator<S> {
        self.validator.clone()
    }

    /// Admit a block with no ledger changes.
    pub fn admit(&mut self, block: Block) -> Result<Admission, WeaveError> {
        self.admit_with_ledger(block, LedgerUpdate::default())
    }

    /// Admit a block together with its UTXO changes as one atomic unit.
    pub fn admit_with_ledger(
        &mut self,
        block: Block,
        update: LedgerUpdate,
    ) -> Result<Admission, WeaveError> {
        if let Err(e) = self.check_admissible(&block, &update) {
            tracing::warn!(
                height = block.height,
                hash = %short_hex(&block.hash),
                old_block_ref = %short_hex(&block.old_block_ref),
                "block rejected: {}",
                e
            );
            return Err(e);
        }
        self.commit(block, update)
    }

    fn check_admissible(&self, block: &Block, update: &LedgerUpdate) -> Result<(), WeaveError> {
        block::verify_block_hash(block)?;
        if self.validator.is_stored(&block.hash)? {
            return Err(WeaveError::InvalidBlock {
                reason: format!("block {} already admitted", short_hex(&block.hash)),
            });
        }
        if !self.validator.check(block)? {
            return Err(WeaveError::MissingHistoricalReference {
                old_block_ref: hash_hex(&block.old_block_ref),
            });
        }
        self.ledger.check_update(update)
    }

    fn commit(&mut self, block: Block, update: LedgerUpdate) -> Result<Admission, WeaveError> {
        self.ledger.check_update(&update)?;

        let position = self.chain.len() as u64;
        let state = WeaveState {
            chain_len: position + 1,
            latest_hash: block.hash,
            last_confirmed: block.transactions.len() as u64,
        };

        let mut ops = HistoricalStore::<S>::block_ops(&block, position, &state)?;
        for outpoint in &update.spent {
            ops.push(UtxoStore::<S>::delete_op(&outpoint.key()));
        }
        for utxo in &update.created {
            ops.push(UtxoStore::<S>::insert_op(utxo)?);
        }
        self.store.write_batch(ops)?;

        let utxo_root = self.ledger.apply(update)?;
        self.last_confirmed = state.last_confirmed;
        tracing::info!(
            height = block.height,
            hash = %short_hex(&block.hash),
            old_block_ref = %short_hex(&block.old_block_ref),
            txs = block.transactions.len(),
            chain_len = state.chain_len,
            "block admitted"
        );
        let admission = Admission {
            hash: block.hash,
            height: block.height,
            chain_len: state.chain_len,
            utxo_root,
        };
        self.chain.push(block);
        Ok(admission)
    }

    /// Assemble the next block from `candidates`, in order.
    ///
    /// A candidate is dropped if it is malformed, repeats an id, spends an
    /// output that is unknown or already spent earlier in the block, or
    /// creates an output that already exists. Once the serialized block would
    /// exceed the current byte limit, that candidate and everything after it
    /// is deferred.
    pub fn propose_block(
        &self,
        candidates: Vec<BlockTransaction>,
        old_block_ref: Hash,
    ) -> Result<Proposal, WeaveError> {
        let tip = self.chain.last().ok_or_else(|| WeaveError::InvalidBlock {
            reason: "cannot propose before genesis".to_string(),
        })?;
        let limit = self.capacity.byte_limit();

        let mut size = EMPTY_BLOCK_SIZE;
        let mut ids: HashSet<TxId> = HashSet::new();
        let mut spent: HashSet<OutPoint> = HashSet::new();
        let mut created_keys: HashSet<String> = HashSet::new();
        let mut update = LedgerUpdate::default();
        let mut tx_ids = Vec::new();
        let mut included = Vec::new();
        let mut deferred = Vec::new();
        let mut dropped = Vec::new();

        let mut candidates = candidates.into_iter();
        while let Some(tx) = candidates.next() {
            if let Err(e) = self.check_candidate(&tx, &ids, &spent, &created_keys) {
                tracing::debug!(tx_id = %tx.id, "dropping candidate: {}", e);
                dropped.push((tx.id, e));
                continue;
            }
            let tx_size = block::tx_id_size(&tx.id);
            if size + tx_size > limit {
                tracing::debug!(
                    size,
                    limit,
                    remaining = candidates.len() + 1,
                    "block full, deferring candidates"
                );
                deferred.push(tx);
                deferred.extend(candidates.by_ref());
                break;
            }

            size += tx_size;
            ids.insert(tx.id.clone());
            for input in &tx.inputs {
                spent.insert(input.clone());
            }
            let created = tx.created_utxos();
            created_keys.extend(created.iter().map(Utxo::key));
            update.spent.extend(tx.inputs.iter().cloned());
            update.created.extend(created);
            tx_ids.push(tx.id.clone());
            included.push(tx);
        }

        let block = block::build_block(tip.height + 1, tip.hash, tx_ids, old_block_ref);
        tracing::debug!(
            height = block.height,
            txs = included.len(),
            deferred = deferred.len(),
            dropped = dropped.len(),
            size,
            limit,
            "proposed block"
        );
        Ok(Proposal {
            block,
            update,
            included,
            deferred,
            dropped,
        })
    }

    fn check_candidate(
        &self,
        tx: &BlockTransaction,
        ids: &HashSet<TxId>,
        spent: &HashSet<OutPoint>,
        created_keys: &HashSet<String>,
    ) -> Result<(), WeaveError> {
        tx.check_shape()?;
        if ids.contains(&tx.id) {
            return Err(WeaveError::DuplicateTransaction {
                tx_id: tx.id.clone(),
            });
        }
        for input in &tx.inputs {
            if spent.contains(input) {
                return Err(WeaveError::DuplicateOutput { key: input.key() });
            }
            if !self.ledger.verify_input(&input.tx_id, input.output_index) {
                return Err(WeaveError::UnknownOutput { key: input.key() });
            }
        }
        for utxo in tx.created_utxos() {
            let key = utxo.key();
            if created_keys.contains(&key) || self.ledger.verify_input(&utxo.tx_id, utxo.output_index)
            {
                return Err(WeaveError::DuplicateOutput { key });
            }
        }
        Ok(())
    }

    /// Feed the current backlog to the capacity controller. The confirmed
    /// count is the size of the last admitted block; before any transaction
    /// has been confirmed the ceiling is held.
    pub fn record_load(&mut self, pending: u64) -> f64 {
        self.capacity.update_or_hold(pending, self.last_confirmed)
    }

    /// Serialize a block and split it into erasure-coded chunks.
    pub fn encode_block(&self, block: &Block) -> Result<Vec<EncodedChunk>, WeaveError> {
        let bytes = borsh::to_vec(block).map_err(|e| WeftError::SerializationError {
            reason: e.to_string(),
        })?;
        Ok(self.transport.encode(&bytes)?)
    }

    /// Rebuild a block from received chunks and check its hash.
    pub fn receive_block(&self, chunks: &[EncodedChunk]) -> Result<Block, WeaveError> {
        let bytes = self.transport.decode(chunks)?;
        let block = Block::try_from_slice(&bytes).map_err(|e| WeftError::DeserializationError {
            reason: e.to_string(),
        })?;
        block::verify_block_hash(&block)?;
        Ok(block)
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Look up any admitted block by hash.
    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>, WeaveError> {
        Ok(HistoricalStore::new(self.store.clone()).get(hash)?)
    }

    pub fn ledger(&self) -> &UtxoLedger {
        &self.ledger
    }

    pub fn capacity(&self) -> &CapacityController {
        &self.capacity
    }

    pub fn transport(&self) -> &ErasureTransport {
        &self.transport
    }

    pub fn last_confirmed(&self) -> u64 {
        self.last_confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{build_block, genesis_block};
    use weft_relay::error::RelayError;
    use weft_types::transaction::{Transaction, TxOutput};

    type Engine = ConsensusEngine<Arc<MemoryStore>>;

    fn new_engine() -> (Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = ConsensusEngine::open(store.clone(), EngineConfig::default()).unwrap();
        (engine, store)
    }

    fn engine_with_genesis() -> (Engine, Arc<MemoryStore>, Block) {
        let (mut engine, store) = new_engine();
        let genesis = genesis_block(vec!["TX0000".to_string()]);
        engine
            .insert_genesis(
                genesis.clone(),
                vec![
                    Utxo::new("TX0000", 0, 1_000, "alice"),
                    Utxo::new("TX0000", 1, 500, "bob"),
                ],
            )
            .unwrap();
        (engine, store, genesis)
    }

    fn spend(id: &str, input: (&str, u32), amounts: &[u128]) -> BlockTransaction {
        BlockTransaction {
            id: id.to_string(),
            transaction: Transaction::new("alice", "carol", amounts[0], vec![]),
            timestamp: 1_625_097_600,
            inputs: vec![OutPoint::new(input.0, input.1)],
            outputs: amounts
                .iter()
                .map(|&amount| TxOutput {
                    amount,
                    address: "carol".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_end_to_end_admission() {
        let (mut engine, _, genesis) = engine_with_genesis();
        assert_eq!(engine.chain_len(), 1);

        let b1 = build_block(1, genesis.hash, vec!["TX0001".to_string()], genesis.hash);
        assert!(engine.validate(&b1));
        let admitted = engine.admit(b1.clone()).unwrap();
        assert_eq!(admitted.chain_len, 2);
        assert_eq!(admitted.hash, b1.hash);

        let b2 = build_block(2, b1.hash, vec!["TX0002".to_string()], [0xee; 48]);
        assert!(!engine.validate(&b2));
        let err = engine.admit(b2).unwrap_err();
        assert!(matches!(err, WeaveError::MissingHistoricalReference { .. }));
        assert!(err.is_rejection());
        assert_eq!(engine.chain_len(), 2);
    }

    #[test]
    fn test_reference_to_any_earlier_block() {
        let (mut engine, _, genesis) = engine_with_genesis();
        let b1 = build_block(1, genesis.hash, vec![], genesis.hash);
        engine.admit(b1.clone()).unwrap();
        let b2 = build_block(2, b1.hash, vec![], b1.hash);
        engine.admit(b2.clone()).unwrap();
        // Height 3 proves access to genesis rather than its predecessor.
        let b3 = build_block(3, b2.hash, vec![], genesis.hash);
        engine.admit(b3).unwrap();
        assert_eq!(engine.chain_len(), 4);
    }

    #[test]
    fn test_rejection_leaves_store_untouched() {
        let (mut engine, store, genesis) = engine_with_genesis();
        let before = store.len().unwrap();
        let bad = build_block(1, genesis.hash, vec!["TX0001".to_string()], [7u8; 48]);
        assert!(engine.admit(bad.clone()).is_err());
        assert_eq!(store.len().unwrap(), before);
        assert_eq!(engine.chain_len(), 1);
        assert!(engine.get_block(&bad.hash).unwrap().is_none());
    }

    #[test]
    fn test_tampered_hash_rejected() {
        let (mut engine, _, genesis) = engine_with_genesis();
        let mut block = build_block(1, genesis.hash, vec![], genesis.hash);
        block.hash = [1u8; 48];
        assert!(matches!(
            engine.admit(block),
            Err(WeaveError::InvalidBlock { .. })
        ));
        assert_eq!(engine.chain_len(), 1);
    }

    #[test]
    fn test_readmission_rejected() {
        let (mut engine, _, genesis) = engine_with_genesis();
        let b1 = build_block(1, genesis.hash, vec![], genesis.hash);
        engine.admit(b1.clone()).unwrap();
        assert!(matches!(engine.admit(b1), Err(WeaveError::InvalidBlock { .. })));
        assert_eq!(engine.chain_len(), 2);
    }

    #[test]
    fn test_genesis_rules() {
        let (mut engine, _) = new_engine();
        let not_genesis = build_block(1, ZERO_HASH, vec![], ZERO_HASH);
        assert!(matches!(
            engine.insert_genesis(not_genesis, vec![]),
            Err(WeaveError::InvalidBlock { .. })
        ));
        engine.insert_genesis(genesis_block(vec![]), vec![]).unwrap();
        assert!(matches!(
            engine.insert_genesis(genesis_block(vec!["X".to_string()]), vec![]),
            Err(WeaveError::InvalidBlock { .. })
        ));
    }

    #[test]
    fn test_admit_with_ledger_applies_update() {
        let (mut engine, store, genesis) = engine_with_genesis();
        let update = LedgerUpdate {
            spent: vec![OutPoint::new("TX0000", 0)],
            created: vec![Utxo::new("TX0001", 0, 1_000, "carol")],
        };
        let b1 = build_block(1, genesis.hash, vec!["TX0001".to_string()], genesis.hash);
        let admitted = engine.admit_with_ledger(b1, update).unwrap();

        assert!(!engine.ledger().verify_input("TX0000", 0));
        assert!(engine.ledger().verify_input("TX0001", 0));
        assert_eq!(admitted.utxo_root, Some(engine.ledger().merkle_root().unwrap()));

        let persisted = UtxoStore::new(store).load_all().unwrap();
        let keys: Vec<String> = persisted.iter().map(Utxo::key).collect();
        assert_eq!(keys, vec!["TX0000:1", "TX0001:0"]);
    }

    #[test]
    fn test_failed_ledger_check_rejects_block() {
        let (mut engine, store, genesis) = engine_with_genesis();
        let before = store.len().unwrap();
        let root = engine.ledger().merkle_root().unwrap();
        let update = LedgerUpdate {
            spent: vec![OutPoint::new("TX0000", 0), OutPoint::new("TX0404", 0)],
            created: vec![Utxo::new("TX0001", 0, 1_000, "carol")],
        };
        let b1 = build_block(1, genesis.hash, vec!["TX0001".to_string()], genesis.hash);
        assert!(matches!(
            engine.admit_with_ledger(b1, update),
            Err(WeaveError::UnknownOutput { .. })
        ));
        assert_eq!(store.len().unwrap(), before);
        assert_eq!(engine.chain_len(), 1);
        assert_eq!(engine.ledger().merkle_root().unwrap(), root);
    }

    #[test]
    fn test_propose_skips_double_spend_and_unknown() {
        let (engine, _, genesis) = engine_with_genesis();
        let candidates = vec![
            spend("TX0001", ("TX0000", 0), &[600, 400]),
            spend("TX0002", ("TX0000", 0), &[1_000]),
            spend("TX0003", ("TX0404", 0), &[1]),
            spend("TX0004", ("TX0000", 1), &[500]),
        ];
        let proposal = engine.propose_block(candidates, genesis.hash).unwrap();

        assert_eq!(proposal.block.transactions, vec!["TX0001", "TX0004"]);
        assert_eq!(proposal.block.height, 1);
        assert_eq!(proposal.block.prev_hash, genesis.hash);
        assert_eq!(proposal.dropped.len(), 2);
        assert!(matches!(proposal.dropped[0].1, WeaveError::DuplicateOutput { .. }));
        assert!(matches!(proposal.dropped[1].1, WeaveError::UnknownOutput { .. }));
        assert_eq!(proposal.update.spent.len(), 2);
        assert_eq!(proposal.update.created.len(), 3);
        assert!(proposal.deferred.is_empty());
    }

    #[test]
    fn test_proposal_admits_cleanly() {
        let (mut engine, _, genesis) = engine_with_genesis();
        let proposal = engine
            .propose_block(vec![spend("TX0001", ("TX0000", 0), &[999])], genesis.hash)
            .unwrap();
        engine
            .admit_with_ledger(proposal.block, proposal.update)
            .unwrap();
        assert_eq!(engine.last_confirmed(), 1);
        assert!(engine.ledger().verify_input("TX0001", 0));
    }

    #[test]
    fn test_propose_respects_byte_limit() {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig {
            capacity: CapacityConfig {
                // 200 bytes: the empty block plus four 10-byte ids.
                min_size: 0.0002,
                max_size: 1.0,
                threshold: 0.8,
            },
            erasure: ErasureConfig::default(),
        };
        let mut engine = ConsensusEngine::open(store, config).unwrap();
        let premine: Vec<Utxo> = (0..6).map(|i| Utxo::new("TX0000", i, 10, "alice")).collect();
        let genesis = genesis_block(vec![]);
        engine.insert_genesis(genesis.clone(), premine).unwrap();

        let candidates: Vec<BlockTransaction> = (0..6)
            .map(|i| spend(&format!("TX010{}", i), ("TX0000", i), &[10]))
            .collect();
        let proposal = engine.propose_block(candidates, genesis.hash).unwrap();
        assert_eq!(proposal.included.len(), 4);
        assert_eq!(proposal.deferred.len(), 2);
        assert_eq!(proposal.deferred[0].id, "TX0104");
        assert!(block::serialized_size(&proposal.block) <= engine.capacity().byte_limit());
    }

    #[test]
    fn test_propose_requires_genesis() {
        let (engine, _) = new_engine();
        assert!(matches!(
            engine.propose_block(vec![], ZERO_HASH),
            Err(WeaveError::InvalidBlock { .. })
        ));
    }

    #[test]
    fn test_record_load_uses_last_block() {
        let (mut engine, _, genesis) = engine_with_genesis();
        // Genesis confirmed one transaction; 3 pending gives ratio 3.0.
        assert_eq!(engine.record_load(3), 4.0);

        let empty = build_block(1, genesis.hash, vec![], genesis.hash);
        engine.admit(empty).unwrap();
        assert_eq!(engine.last_confirmed(), 0);
        assert_eq!(engine.record_load(100), 4.0);
    }

    #[test]
    fn test_encode_receive_round_trip_with_losses() {
        let (engine, _, genesis) = engine_with_genesis();
        let block = build_block(
            1,
            genesis.hash,
            (0..20).map(|i| format!("TX{:04}", i)).collect(),
            genesis.hash,
        );
        let chunks = engine.encode_block(&block).unwrap();
        assert_eq!(chunks.len(), engine.transport().chunk_count());

        // Drop two symbols from every segment.
        let kept: Vec<EncodedChunk> = chunks.iter().filter(|c| c.index >= 2).cloned().collect();
        assert_eq!(engine.receive_block(&kept).unwrap(), block);

        // Three losses in segment 1 exceed the redundancy.
        let lossy: Vec<EncodedChunk> = chunks
            .iter()
            .filter(|c| !(c.segment == 1 && c.index < 3))
            .cloned()
            .collect();
        assert!(matches!(
            engine.receive_block(&lossy),
            Err(WeaveError::RelayError(RelayError::IncompleteReconstruction { .. }))
        ));
    }

    #[test]
    fn test_corrupted_chunk_never_yields_a_different_block() {
        let (engine, _, genesis) = engine_with_genesis();
        let block = build_block(1, genesis.hash, vec!["TX0001".to_string()], genesis.hash);
        let mut chunks = engine.encode_block(&block).unwrap();
        for chunk in chunks.iter_mut().filter(|c| c.index == 0) {
            chunk.data[0] ^= 0xff;
        }
        assert_eq!(engine.receive_block(&chunks).unwrap(), block);
    }

    #[test]
    fn test_open_recovers_state() {
        let (mut engine, store, genesis) = engine_with_genesis();
        let b1 = build_block(1, genesis.hash, vec!["TX0001".to_string()], genesis.hash);
        engine
            .admit_with_ledger(
                b1.clone(),
                LedgerUpdate {
                    spent: vec![OutPoint::new("TX0000", 1)],
                    created: vec![Utxo::new("TX0001", 0, 500, "dave")],
                },
            )
            .unwrap();
        let root = engine.ledger().merkle_root().unwrap();
        drop(engine);

        let reopened = ConsensusEngine::open(store, EngineConfig::default()).unwrap();
        assert_eq!(reopened.chain_len(), 2);
        assert_eq!(reopened.tip().unwrap().hash, b1.hash);
        assert_eq!(reopened.last_confirmed(), 1);
        assert_eq!(reopened.ledger().merkle_root().unwrap(), root);
        assert!(reopened.validate(&build_block(2, b1.hash, vec![], b1.hash)));
    }

    #[test]
    fn test_concurrent_validators() {
        let (mut engine, _, genesis) = engine_with_genesis();
        let validators: Vec<_> = (0..4).map(|_| engine.validator()).collect();
        let probe = build_block(1, genesis.hash, vec![], genesis.hash);
        let unknown = build_block(1, genesis.hash, vec![], [3u8; 48]);

        std::thread::scope(|s| {
            for v in &validators {
                let probe = &probe;
                let unknown = &unknown;
                s.spawn(move || {
                    for _ in 0..100 {
                        assert!(v.validate(probe));
                        assert!(!v.validate(unknown));
                    }
                });
            }
        });

        engine.admit(probe.clone()).unwrap();
        let next = build_block(2, probe.hash, vec![], probe.hash);
        assert!(validators[0].validate(&next));
    }
}
