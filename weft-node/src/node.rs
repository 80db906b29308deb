use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::task::JoinHandle;
use weft_crypto::anchor::TransactionAnchor;
use weft_relay::codec;
use weft_storage::memory::MemoryStore;
use weft_types::chunk::EncodedChunk;
use weft_types::constants::ONE_TOKEN;
use weft_types::primitives::*;
use weft_types::transaction::{BlockTransaction, Transaction, TxOutput, Utxo};
use weft_weave::block::genesis_block;
use weft_weave::engine::ConsensusEngine;
use weft_weave::error::WeaveError;
use weft_weave::mempool::Mempool;

use crate::admission::{self, AdmissionHandle, EngineStatus};
use crate::config::NodeConfig;
use crate::error::NodeError;

/// Timestamp of the first simulated transaction.
const SIMULATION_EPOCH: Timestamp = 1_700_000_000;

/// In-memory pipe capacity used to carry framed chunks between peers.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Counters collected over a simulation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub rounds: u64,
    pub admitted: u64,
    /// Blocks rejected for a missing historical reference.
    pub rejected: u64,
    /// Blocks whose chunks could not be reassembled.
    pub undecodable: u64,
    pub transactions_confirmed: u64,
    pub transactions_dropped: u64,
    pub pending: usize,
    pub status: Option<EngineStatus>,
}

/// A local node driving block production against its own admission service.
///
/// Each round it submits fresh transactions, proposes a block that proves
/// access to a randomly chosen earlier block, propagates the block's chunks
/// over a lossy in-memory link, admits whatever arrives, and feeds the
/// backlog to the capacity controller.
pub struct Node {
    config: NodeConfig,
    admission: AdmissionHandle<Arc<MemoryStore>>,
    admission_task: JoinHandle<()>,
    mempool: Mempool,
    rng: StdRng,
    /// Outputs the simulated wallets may still spend, keyed by ledger key.
    spendable: BTreeMap<String, Utxo>,
    /// Hashes of every admitted block, genesis included.
    known_blocks: Vec<Hash>,
    next_tx: u64,
    report: SimulationReport,
}

impl Node {
    /// Build the engine, start the admission service, and store genesis.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let engine = ConsensusEngine::in_memory(config.engine_config())?;
        let (admission, admission_task) = admission::spawn(engine);

        let premine: Vec<Utxo> = (0..config.simulation.premine_outputs)
            .map(|i| Utxo::new("GENESIS", i, 1_000 * ONE_TOKEN, wallet_address(i as usize)))
            .collect();
        let genesis = genesis_block(vec!["GENESIS".to_string()]);
        let admitted = admission.insert_genesis(genesis, premine.clone()).await?;
        tracing::info!(
            hash = %short_hex(&admitted.hash),
            premine = premine.len(),
            "genesis stored"
        );

        Ok(Self {
            mempool: Mempool::new(config.simulation.mempool_capacity),
            rng: StdRng::seed_from_u64(config.simulation.seed),
            spendable: premine.into_iter().map(|u| (u.key(), u)).collect(),
            known_blocks: vec![admitted.hash],
            next_tx: 0,
            report: SimulationReport::default(),
            admission,
            admission_task,
            config,
        })
    }

    pub fn admission(&self) -> &AdmissionHandle<Arc<MemoryStore>> {
        &self.admission
    }

    /// Run the configured number of rounds and report what happened.
    pub async fn run(&mut self) -> Result<SimulationReport, NodeError> {
        for _ in 0..self.config.simulation.blocks {
            self.round().await?;
        }
        self.report.pending = self.mempool.len();
        self.report.status = Some(self.admission.status().await?);
        Ok(self.report.clone())
    }

    /// One proposal cycle.
    pub async fn round(&mut self) -> Result<(), NodeError> {
        self.report.rounds += 1;
        self.submit_transactions();

        let old_block_ref = self.pick_historical_ref();
        let candidates = self.mempool.drain();
        let (proposal, chunks) = self.admission.propose(candidates, old_block_ref).await?;

        self.report.transactions_dropped += proposal.dropped.len() as u64;
        for (tx_id, reason) in &proposal.dropped {
            tracing::debug!(tx_id = %tx_id, "transaction dropped: {}", reason);
        }
        self.mempool.requeue(proposal.deferred);

        // A validator peer checks the reference while the block is in flight.
        let validator = self.admission.validator();
        let block = proposal.block.clone();
        let precheck = tokio::task::spawn_blocking(move || validator.validate(&block));

        let received = self.propagate(chunks).await?;
        let accessible = precheck.await.unwrap_or(false);
        tracing::debug!(
            height = proposal.block.height,
            accessible,
            received = received.len(),
            "block propagated"
        );

        match self.admission.receive(received, proposal.update.clone()).await {
            Ok(admitted) => {
                self.report.admitted += 1;
                self.report.transactions_confirmed += proposal.included.len() as u64;
                self.known_blocks.push(admitted.hash);
                for utxo in proposal.update.created {
                    self.spendable.insert(utxo.key(), utxo);
                }
            }
            Err(NodeError::WeaveError(WeaveError::MissingHistoricalReference { .. })) => {
                self.report.rejected += 1;
                self.mempool.requeue(proposal.included);
            }
            Err(e) if lost_in_transit(&e) => {
                tracing::warn!(height = proposal.block.height, "block lost in transit: {}", e);
                self.report.undecodable += 1;
                self.mempool.requeue(proposal.included);
            }
            Err(e) => return Err(e),
        }

        let size = self
            .admission
            .record_load(self.mempool.len() as u64)
            .await?;
        tracing::debug!(pending = self.mempool.len(), size_mb = size, "round complete");
        Ok(())
    }

    /// Create new transactions spending random wallet outputs.
    fn submit_transactions(&mut self) {
        for _ in 0..self.config.simulation.transactions_per_block {
            if self.spendable.is_empty() {
                break;
            }
            let pick = self.rng.gen_range(0..self.spendable.len());
            let Some(key) = self.spendable.keys().nth(pick).cloned() else {
                break;
            };
            let Some(input) = self.spendable.remove(&key) else {
                break;
            };

            let tx = self.spend(input);
            let anchor = TransactionAnchor::create(&tx.transaction, tx.timestamp);
            tracing::debug!(tx_id = %tx.id, anchor = %anchor, "transaction submitted");
            if let Err(e) = self.mempool.add(tx) {
                tracing::warn!("mempool rejected transaction: {}", e);
            }
        }
    }

    fn spend(&mut self, input: Utxo) -> BlockTransaction {
        let id = format!("TX{:06}", self.next_tx);
        let timestamp = SIMULATION_EPOCH + self.next_tx;
        self.next_tx += 1;

        let wallets = self.config.simulation.premine_outputs as usize;
        let receiver = wallet_address(self.rng.gen_range(0..wallets));
        let amount = if input.amount > 1 {
            self.rng.gen_range(1..input.amount)
        } else {
            input.amount
        };
        let mut outputs = vec![TxOutput {
            amount,
            address: receiver.clone(),
        }];
        if input.amount > amount {
            outputs.push(TxOutput {
                amount: input.amount - amount,
                address: input.address.clone(),
            });
        }

        BlockTransaction {
            id,
            transaction: Transaction::new(input.address.clone(), receiver, amount, Vec::new()),
            timestamp,
            inputs: vec![input.outpoint()],
            outputs,
        }
    }

    /// A random admitted block, or occasionally a hash no peer has stored.
    fn pick_historical_ref(&mut self) -> Hash {
        if self.rng.gen_bool(self.config.simulation.orphan_ref_rate) {
            let mut unknown = [0u8; HASH_LEN];
            self.rng.fill(&mut unknown[..]);
            return unknown;
        }
        let index = self.rng.gen_range(0..self.known_blocks.len());
        self.known_blocks[index]
    }

    /// Send chunks over an in-memory link that drops `loss_per_segment`
    /// random chunks from every segment, and collect what arrives.
    async fn propagate(
        &mut self,
        chunks: Vec<EncodedChunk>,
    ) -> Result<Vec<EncodedChunk>, NodeError> {
        let loss = self.config.simulation.loss_per_segment;
        let mut by_segment: BTreeMap<u16, Vec<EncodedChunk>> = BTreeMap::new();
        for chunk in chunks {
            by_segment.entry(chunk.segment).or_default().push(chunk);
        }
        let mut sent = Vec::new();
        for (_, mut segment) in by_segment {
            for _ in 0..loss.min(segment.len()) {
                let victim = self.rng.gen_range(0..segment.len());
                segment.swap_remove(victim);
            }
            sent.extend(segment);
        }

        let (mut local, mut remote) = tokio::io::duplex(PIPE_CAPACITY);
        let writer = tokio::spawn(async move {
            for chunk in &sent {
                codec::write_chunk(&mut local, chunk).await?;
            }
            Ok::<_, weft_relay::error::RelayError>(())
        });
        let received = codec::read_all_chunks(&mut remote).await?;
        writer.await.map_err(|e| NodeError::IoError(e.into()))??;
        Ok(received)
    }

    /// Stop the admission service.
    pub async fn shutdown(self) {
        let Node {
            admission,
            admission_task,
            ..
        } = self;
        drop(admission);
        if let Err(e) = admission_task.await {
            tracing::warn!("admission task ended abnormally: {}", e);
        }
    }
}

/// Failures meaning the block never arrived intact: too few chunks, or bytes
/// that do not rebuild into the proposed block.
fn lost_in_transit(err: &NodeError) -> bool {
    matches!(
        err,
        NodeError::WeaveError(
            WeaveError::RelayError(_) | WeaveError::InvalidBlock { .. } | WeaveError::Types(_)
        )
    )
}

fn wallet_address(i: usize) -> Address {
    format!("0x{:040x}", i + 1)
}
