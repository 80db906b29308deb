use rayon::prelude::*;
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};
use weft_crypto::hash::FieldHasher;
use weft_types::chunk::EncodedChunk;
use weft_types::constants::{
    DEFAULT_DATA_SEGMENTS, DEFAULT_REDUNDANCY, DEFAULT_SYMBOLS_PER_SEGMENT, MAX_CODEWORD_SYMBOLS,
};
use weft_types::primitives::{Hash, HASH_LEN};

use crate::error::RelayError;

const CHUNK_DIGEST_DOMAIN: &str = "weft-chunk-v1";

/// Shape of the erasure code applied to block payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErasureConfig {
    /// Equal-size segments the payload is split into.
    pub data_segments: usize,
    /// Data symbols per segment.
    pub symbols_per_segment: usize,
    /// Parity symbols per segment; the number of symbols each segment may lose.
    pub redundancy: usize,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            data_segments: DEFAULT_DATA_SEGMENTS,
            symbols_per_segment: DEFAULT_SYMBOLS_PER_SEGMENT,
            redundancy: DEFAULT_REDUNDANCY,
        }
    }
}

/// What happened to one segment during decoding.
///
/// `corrupt` counts chunks that arrived but failed their digest check; they
/// are treated exactly like missing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Rebuilt; `missing` symbols were absent or corrupt and recovered from parity.
    Reconstructed {
        segment: u16,
        missing: usize,
        corrupt: usize,
    },
    /// Fewer intact symbols arrived than the code needs.
    Lost {
        segment: u16,
        received: usize,
        needed: usize,
        corrupt: usize,
    },
}

impl SegmentOutcome {
    pub fn is_lost(&self) -> bool {
        matches!(self, SegmentOutcome::Lost { .. })
    }

    pub fn segment(&self) -> u16 {
        match self {
            SegmentOutcome::Reconstructed { segment, .. } | SegmentOutcome::Lost { segment, .. } => {
                *segment
            }
        }
    }
}

/// Splits serialized blocks into redundant chunks and rebuilds them from a
/// partial chunk set.
pub struct ErasureTransport {
    config: ErasureConfig,
    code: ReedSolomon,
}

impl ErasureTransport {
    pub fn new(config: ErasureConfig) -> Result<Self, RelayError> {
        if config.data_segments == 0 || config.data_segments > u16::MAX as usize {
            return Err(RelayError::InvalidConfig {
                reason: format!(
                    "data_segments must be within 1..={}, got {}",
                    u16::MAX,
                    config.data_segments
                ),
            });
        }
        if config.symbols_per_segment == 0 || config.redundancy == 0 {
            return Err(RelayError::InvalidConfig {
                reason: "symbols_per_segment and redundancy must both be at least 1".to_string(),
            });
        }
        let total = config.symbols_per_segment + config.redundancy;
        if total > MAX_CODEWORD_SYMBOLS {
            return Err(RelayError::InvalidConfig {
                reason: format!(
                    "codeword of {} symbols exceeds the GF(256) limit of {}",
                    total, MAX_CODEWORD_SYMBOLS
                ),
            });
        }
        let code = ReedSolomon::new(config.symbols_per_segment, config.redundancy)
            .map_err(|e| RelayError::InvalidConfig {
                reason: format!("{:?}", e),
            })?;
        Ok(Self { config, code })
    }

    pub fn config(&self) -> &ErasureConfig {
        &self.config
    }

    fn total_symbols(&self) -> usize {
        self.config.symbols_per_segment + self.config.redundancy
    }

    /// Total chunks produced per block.
    pub fn chunk_count(&self) -> usize {
        self.config.data_segments * self.total_symbols()
    }

    /// Encode `payload` into `data_segments * (symbols_per_segment +
    /// redundancy)` chunks, ordered by segment then symbol index.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<EncodedChunk>, RelayError> {
        let shard_len = self.shard_len(payload.len());
        let segment_len = shard_len * self.config.symbols_per_segment;
        let payload_len = payload.len() as u64;
        let total = self.total_symbols();

        let mut padded = payload.to_vec();
        padded.resize(segment_len * self.config.data_segments, 0);

        let segments: Vec<Vec<EncodedChunk>> = padded
            .par_chunks(segment_len)
            .enumerate()
            .map(|(segment, bytes)| -> Result<Vec<EncodedChunk>, RelayError> {
                let mut shards: Vec<Vec<u8>> =
                    bytes.chunks(shard_len).map(<[u8]>::to_vec).collect();
                shards.resize(total, vec![0u8; shard_len]);
                self.code.encode(&mut shards).map_err(erasure_error)?;
                Ok(shards
                    .into_iter()
                    .enumerate()
                    .map(|(index, data)| seal(segment as u16, index as u16, payload_len, data))
                    .collect())
            })
            .collect::<Result<_, RelayError>>()?;
        let chunks: Vec<EncodedChunk> = segments.into_iter().flatten().collect();

        tracing::debug!(
            payload_len = payload.len(),
            shard_len,
            chunks = chunks.len(),
            "encoded block payload"
        );
        Ok(chunks)
    }

    /// Rebuild the payload from whatever chunks arrived.
    ///
    /// Chunks failing their digest count as lost. Fails with
    /// `IncompleteReconstruction` if any segment is short of more than
    /// `redundancy` intact symbols; partial output is never returned.
    pub fn decode(&self, chunks: &[EncodedChunk]) -> Result<Vec<u8>, RelayError> {
        let (payload_len, decoded) = self.decode_segments(chunks)?;

        let lost: Vec<u16> = decoded
            .iter()
            .filter(|(outcome, _)| outcome.is_lost())
            .map(|(outcome, _)| outcome.segment())
            .collect();
        if !lost.is_empty() {
            tracing::warn!(lost_segments = ?lost, "block payload could not be reconstructed");
            return Err(RelayError::IncompleteReconstruction {
                lost_segments: lost,
            });
        }

        let mut payload = Vec::with_capacity(payload_len);
        for (_, shards) in decoded {
            for shard in shards.into_iter().flatten() {
                payload.extend_from_slice(&shard);
            }
        }
        payload.truncate(payload_len);
        Ok(payload)
    }

    /// Per-segment outcome of decoding `chunks`, without assembling the payload.
    pub fn decode_report(&self, chunks: &[EncodedChunk]) -> Result<Vec<SegmentOutcome>, RelayError> {
        Ok(self
            .decode_segments(chunks)?
            .1
            .into_iter()
            .map(|(outcome, _)| outcome)
            .collect())
    }

    fn decode_segments(
        &self,
        chunks: &[EncodedChunk],
    ) -> Result<(usize, Vec<(SegmentOutcome, Option<Vec<Vec<u8>>>)>), RelayError> {
        let total = self.total_symbols();
        let needed = self.config.symbols_per_segment;

        let mut corrupt = vec![0usize; self.config.data_segments];
        let intact: Vec<&EncodedChunk> = chunks
            .iter()
            .filter(|chunk| {
                if chunk.digest == chunk_digest(chunk) {
                    return true;
                }
                if let Some(count) = corrupt.get_mut(chunk.segment as usize) {
                    *count += 1;
                }
                false
            })
            .collect();
        let discarded: usize = corrupt.iter().sum();
        if discarded > 0 {
            tracing::warn!(discarded, "discarded chunks with a bad digest");
        }

        let Some(first) = intact.first() else {
            return Err(RelayError::IncompleteReconstruction {
                lost_segments: (0..self.config.data_segments as u16).collect(),
            });
        };
        let payload_len = usize::try_from(first.payload_len).map_err(|_| {
            RelayError::MalformedChunk {
                reason: format!("payload length {} does not fit in memory", first.payload_len),
            }
        })?;
        let shard_len = self.shard_len(payload_len);

        let mut segments: Vec<Vec<Option<Vec<u8>>>> =
            vec![vec![None; total]; self.config.data_segments];
        for chunk in &intact {
            if chunk.payload_len != first.payload_len {
                return Err(RelayError::MalformedChunk {
                    reason: format!(
                        "payload length {} disagrees with {}",
                        chunk.payload_len, first.payload_len
                    ),
                });
            }
            let segment = chunk.segment as usize;
            let index = chunk.index as usize;
            if segment >= self.config.data_segments || index >= total {
                return Err(RelayError::MalformedChunk {
                    reason: format!("position {}/{} out of range", segment, index),
                });
            }
            if chunk.data.len() != shard_len {
                return Err(RelayError::MalformedChunk {
                    reason: format!(
                        "symbol {}/{} has {} bytes, expected {}",
                        segment,
                        index,
                        chunk.data.len(),
                        shard_len
                    ),
                });
            }
            if let Some(existing) = &segments[segment][index] {
                if *existing != chunk.data {
                    return Err(RelayError::MalformedChunk {
                        reason: format!("conflicting copies of symbol {}/{}", segment, index),
                    });
                }
                continue;
            }
            segments[segment][index] = Some(chunk.data.clone());
        }

        let decoded = segments
            .into_par_iter()
            .zip(corrupt.into_par_iter())
            .enumerate()
            .map(|(segment, (mut shards, corrupt))| -> Result<_, RelayError> {
                let received = shards.iter().filter(|s| s.is_some()).count();
                let segment = segment as u16;
                match self.code.reconstruct_data(&mut shards) {
                    Ok(()) => {
                        let data = shards
                            .into_iter()
                            .take(needed)
                            .collect::<Option<Vec<Vec<u8>>>>()
                            .ok_or_else(|| RelayError::ErasureError {
                                reason: format!("segment {} left data symbols empty", segment),
                            })?;
                        Ok((
                            SegmentOutcome::Reconstructed {
                                segment,
                                missing: total - received,
                                corrupt,
                            },
                            Some(data),
                        ))
                    }
                    Err(reed_solomon_erasure::Error::TooFewShardsPresent) => {
                        tracing::debug!(segment, received, needed, corrupt, "segment lost");
                        Ok((
                            SegmentOutcome::Lost {
                                segment,
                                received,
                                needed,
                                corrupt,
                            },
                            None,
                        ))
                    }
                    Err(e) => Err(erasure_error(e)),
                }
            })
            .collect::<Result<Vec<_>, RelayError>>()?;

        Ok((payload_len, decoded))
    }

    /// Bytes per symbol for a payload of `payload_len` bytes. At least one, so
    /// that an empty payload still yields a decodable codeword.
    fn shard_len(&self, payload_len: usize) -> usize {
        let symbols = self.config.data_segments * self.config.symbols_per_segment;
        payload_len.div_ceil(symbols).max(1)
    }
}

fn seal(segment: u16, index: u16, payload_len: u64, data: Vec<u8>) -> EncodedChunk {
    let mut chunk = EncodedChunk {
        segment,
        index,
        payload_len,
        data,
        digest: [0u8; HASH_LEN],
    };
    chunk.digest = chunk_digest(&chunk);
    chunk
}

/// Digest binding a symbol to its position and payload.
fn chunk_digest(chunk: &EncodedChunk) -> Hash {
    let mut hasher = FieldHasher::new(CHUNK_DIGEST_DOMAIN);
    hasher
        .u64(chunk.segment as u64)
        .u64(chunk.index as u64)
        .u64(chunk.payload_len)
        .bytes(&chunk.data);
    hasher.finish()
}

fn erasure_error(e: reed_solomon_erasure::Error) -> RelayError {
    RelayError::ErasureError {
        reason: format!("{:?}", e),
    }
}
