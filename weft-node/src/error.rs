use thiserror::Error;
use weft_relay::error::RelayError;
use weft_storage::error::StorageError;
use weft_weave::error::WeaveError;

/// Errors that can occur in the node.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum NodeError {
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("relay error: {0}")]
    RelayError(#[from] RelayError),

    #[error("weave error: {0}")]
    WeaveError(#[from] WeaveError),

    #[error("admission service stopped")]
    AdmissionClosed,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
