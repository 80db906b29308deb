//! Block propagation for the Weft blockweave.
//!
//! Splits serialized blocks into Reed–Solomon coded chunks so that a receiver
//! can rebuild the block after losing or rejecting some of them, and frames
//! chunks for transport.

pub mod codec;
pub mod error;
pub mod transport;
