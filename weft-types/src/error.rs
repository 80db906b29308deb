use thiserror::Error;

/// Errors shared across Weft crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeftError {
    #[error("invalid amount: outputs must carry a positive amount")]
    InvalidAmount,

    #[error("malformed transaction: {reason}")]
    MalformedTransaction { reason: String },

    #[error("merkle proof verification failed")]
    MerkleProofInvalid,

    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("deserialization error: {reason}")]
    DeserializationError { reason: String },
}
