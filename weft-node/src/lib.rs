//! Weft node: configuration, the serialized admission service, and a local
//! block-production simulation.

pub mod admission;
pub mod cli;
pub mod config;
pub mod error;
pub mod node;
