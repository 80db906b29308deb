use thiserror::Error;

/// Errors raised while encoding, framing, or reconstructing blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid erasure config: {reason}")]
    InvalidConfig { reason: String },

    #[error("incomplete reconstruction: segments {lost_segments:?} lost more symbols than the redundancy covers")]
    IncompleteReconstruction { lost_segments: Vec<u16> },

    #[error("malformed chunk: {reason}")]
    MalformedChunk { reason: String },

    #[error("erasure coding failed: {reason}")]
    ErasureError { reason: String },

    #[error("frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("frame version mismatch: peer sent v{got}, we run v{expected}")]
    FrameVersionMismatch { got: u8, expected: u8 },

    #[error("codec error: {reason}")]
    CodecError { reason: String },
}
