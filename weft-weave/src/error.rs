use thiserror::Error;
use weft_relay::error::RelayError;
use weft_storage::error::StorageError;
use weft_types::error::WeftError;

/// Errors specific to block admission and ledger maintenance.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// The block's `old_block_ref` is not in the historical store.
    #[error("block rejected: missing historical reference {old_block_ref}")]
    MissingHistoricalReference { old_block_ref: String },

    #[error("duplicate output: {key}")]
    DuplicateOutput { key: String },

    #[error("unknown output: {key}")]
    UnknownOutput { key: String },

    #[error("ledger is empty")]
    EmptyLedger,

    #[error("capacity update undefined: no confirmed transactions")]
    DivisionUndefined,

    #[error("invalid block: {reason}")]
    InvalidBlock { reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("duplicate transaction: {tx_id}")]
    DuplicateTransaction { tx_id: String },

    #[error("mempool full")]
    MempoolFull,

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("relay error: {0}")]
    RelayError(#[from] RelayError),

    #[error("{0}")]
    Types(#[from] WeftError),
}

impl WeaveError {
    /// Whether this error rejects a block rather than reporting a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            WeaveError::MissingHistoricalReference { .. }
                | WeaveError::InvalidBlock { .. }
                | WeaveError::DuplicateOutput { .. }
                | WeaveError::UnknownOutput { .. }
        )
    }
}
