use thiserror::Error;

/// Errors raised by key-value backends and the stores layered on them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("read failed: {reason}")]
    ReadError { reason: String },

    #[error("write failed: {reason}")]
    WriteError { reason: String },

    #[error("failed to encode value: {reason}")]
    SerializationError { reason: String },

    #[error("failed to decode stored value: {reason}")]
    DeserializationError { reason: String },

    /// Stored records contradict each other.
    #[error("store is corrupt: {reason}")]
    Corrupt { reason: String },
}
