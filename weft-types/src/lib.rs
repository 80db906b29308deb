pub mod chunk;
pub mod constants;
pub mod error;
pub mod primitives;
pub mod transaction;
pub mod weave;
