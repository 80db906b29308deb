//! Block admission engine for the Weft blockweave.
//!
//! Implements Proof-of-Access validation against the historical store,
//! atomic block admission with paired UTXO mutations, adaptive block
//! capacity, block proposal from the mempool, and erasure-coded block
//! propagation helpers.

pub mod block;
pub mod capacity;
pub mod engine;
pub mod error;
pub mod mempool;
pub mod utxo;
