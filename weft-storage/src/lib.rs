//! Storage abstraction for the Weft blockweave.
//!
//! Provides a [`KvStore`](traits::KvStore) trait with an in-memory backend,
//! plus the historical block store and the UTXO store built on top of it.

pub mod error;
pub mod historical_store;
pub mod memory;
pub mod traits;
pub mod utxo_store;
