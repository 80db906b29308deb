//! Serialized admission.
//!
//! The engine lives on a single tokio task. Every mutation reaches it as a
//! command over an mpsc queue and is answered on a oneshot channel, so blocks
//! are admitted one at a time in arrival order. Proof-of-Access checks do not
//! need the queue: [`AdmissionHandle::validator`] hands out a read view of the
//! historical store that any task may use concurrently.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use weft_storage::traits::BatchWriter;
use weft_types::chunk::EncodedChunk;
use weft_types::primitives::{hash_hex, Hash, Height};
use weft_types::transaction::{BlockTransaction, Utxo};
use weft_types::weave::Block;
use weft_weave::engine::{AccessValidator, Admission, ConsensusEngine, Proposal};
use weft_weave::error::WeaveError;
use weft_weave::utxo::LedgerUpdate;

use crate::error::NodeError;

/// Depth of the command queue.
const COMMAND_QUEUE_DEPTH: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, WeaveError>>;

enum Command {
    Genesis {
        block: Block,
        premine: Vec<Utxo>,
        reply: Reply<Admission>,
    },
    Propose {
        candidates: Vec<BlockTransaction>,
        old_block_ref: Hash,
        reply: Reply<(Proposal, Vec<EncodedChunk>)>,
    },
    Receive {
        chunks: Vec<EncodedChunk>,
        update: LedgerUpdate,
        reply: Reply<Admission>,
    },
    Admit {
        block: Block,
        update: LedgerUpdate,
        reply: Reply<Admission>,
    },
    RecordLoad {
        pending: u64,
        reply: oneshot::Sender<f64>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Snapshot of the engine, as reported by [`AdmissionHandle::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub chain_len: usize,
    pub tip_height: Option<Height>,
    pub tip_hash: Option<String>,
    pub utxos: usize,
    pub utxo_root: Option<String>,
    pub capacity_mb: f64,
    pub byte_limit: usize,
    pub last_confirmed: u64,
}

/// Cloneable front end to the admission task.
#[derive(Clone)]
pub struct AdmissionHandle<S: BatchWriter + Clone> {
    commands: mpsc::Sender<Command>,
    validator: AccessValidator<S>,
}

/// Move `engine` onto its own task and return a handle to it. The task ends
/// once every handle is dropped.
pub fn spawn<S>(engine: ConsensusEngine<S>) -> (AdmissionHandle<S>, JoinHandle<()>)
where
    S: BatchWriter + Clone + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let handle = AdmissionHandle {
        commands: tx,
        validator: engine.validator(),
    };
    let task = tokio::spawn(run(engine, rx));
    (handle, task)
}

async fn run<S: BatchWriter + Clone>(
    mut engine: ConsensusEngine<S>,
    mut rx: mpsc::Receiver<Command>,
) {
    tracing::debug!("admission task started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Genesis {
                block,
                premine,
                reply,
            } => {
                let _ = reply.send(engine.insert_genesis(block, premine));
            }
            Command::Propose {
                candidates,
                old_block_ref,
                reply,
            } => {
                let result = engine
                    .propose_block(candidates, old_block_ref)
                    .and_then(|proposal| {
                        let chunks = engine.encode_block(&proposal.block)?;
                        Ok((proposal, chunks))
                    });
                let _ = reply.send(result);
            }
            Command::Receive {
                chunks,
                update,
                reply,
            } => {
                let result = engine
                    .receive_block(&chunks)
                    .and_then(|block| engine.admit_with_ledger(block, update));
                let _ = reply.send(result);
            }
            Command::Admit {
                block,
                update,
                reply,
            } => {
                let _ = reply.send(engine.admit_with_ledger(block, update));
            }
            Command::RecordLoad { pending, reply } => {
                let _ = reply.send(engine.record_load(pending));
            }
            Command::Status { reply } => {
                let _ = reply.send(status(&engine));
            }
        }
    }
    tracing::debug!(chain_len = engine.chain_len(), "admission task stopped");
}

fn status<S: BatchWriter + Clone>(engine: &ConsensusEngine<S>) -> EngineStatus {
    let capacity = engine.capacity();
    EngineStatus {
        chain_len: engine.chain_len(),
        tip_height: engine.tip().map(|b| b.height),
        tip_hash: engine.tip().map(|b| hash_hex(&b.hash)),
        utxos: engine.ledger().len(),
        utxo_root: engine.ledger().merkle_root().ok().map(|root| hash_hex(&root)),
        capacity_mb: capacity.current_size(),
        byte_limit: capacity.byte_limit(),
        last_confirmed: engine.last_confirmed(),
    }
}

impl<S: BatchWriter + Clone> AdmissionHandle<S> {
    /// A Proof-of-Access checker that bypasses the queue.
    pub fn validator(&self) -> AccessValidator<S> {
        self.validator.clone()
    }

    pub async fn insert_genesis(
        &self,
        block: Block,
        premine: Vec<Utxo>,
    ) -> Result<Admission, NodeError> {
        self.request(|reply| Command::Genesis {
            block,
            premine,
            reply,
        })
        .await?
        .map_err(NodeError::from)
    }

    /// Assemble a block from `candidates` and erasure-code it for propagation.
    pub async fn propose(
        &self,
        candidates: Vec<BlockTransaction>,
        old_block_ref: Hash,
    ) -> Result<(Proposal, Vec<EncodedChunk>), NodeError> {
        self.request(|reply| Command::Propose {
            candidates,
            old_block_ref,
            reply,
        })
        .await?
        .map_err(NodeError::from)
    }

    /// Rebuild a propagated block from its chunks and admit it with `update`.
    pub async fn receive(
        &self,
        chunks: Vec<EncodedChunk>,
        update: LedgerUpdate,
    ) -> Result<Admission, NodeError> {
        self.request(|reply| Command::Receive {
            chunks,
            update,
            reply,
        })
        .await?
        .map_err(NodeError::from)
    }

    pub async fn admit(&self, block: Block, update: LedgerUpdate) -> Result<Admission, NodeError> {
        self.request(|reply| Command::Admit {
            block,
            update,
            reply,
        })
        .await?
        .map_err(NodeError::from)
    }

    /// Report the current backlog; returns the new capacity in MB.
    pub async fn record_load(&self, pending: u64) -> Result<f64, NodeError> {
        self.request(|reply| Command::RecordLoad { pending, reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, NodeError> {
        self.request(|reply| Command::Status { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| NodeError::AdmissionClosed)?;
        rx.await.map_err(|_| NodeError::AdmissionClosed)
    }
}
