use borsh::BorshDeserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use weft_types::chunk::EncodedChunk;
use weft_types::constants::{FRAME_VERSION, MAX_FRAME_SIZE};

use crate::error::RelayError;

/// Frame a chunk for transport.
///
/// Wire format: `[4-byte BE length][1-byte version][borsh payload]`. The
/// length covers the version byte and the payload.
pub fn encode_frame(chunk: &EncodedChunk) -> Result<Vec<u8>, RelayError> {
    let payload = borsh::to_vec(chunk).map_err(|e| RelayError::CodecError {
        reason: e.to_string(),
    })?;
    let len = payload.len() + 1;
    if len > MAX_FRAME_SIZE {
        return Err(RelayError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(4 + len);
    frame.extend_from_slice(&(len as u32).to_be_bytes());
    frame.push(FRAME_VERSION);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Parse the body of a frame (everything after the length prefix).
fn decode_body(body: &[u8]) -> Result<EncodedChunk, RelayError> {
    let (&version, payload) = body.split_first().ok_or_else(|| RelayError::CodecError {
        reason: "frame too short: missing version byte".to_string(),
    })?;
    if version != FRAME_VERSION {
        return Err(RelayError::FrameVersionMismatch {
            got: version,
            expected: FRAME_VERSION,
        });
    }
    EncodedChunk::try_from_slice(payload).map_err(|e| RelayError::CodecError {
        reason: e.to_string(),
    })
}

/// Write one framed chunk.
pub async fn write_chunk<T>(io: &mut T, chunk: &EncodedChunk) -> Result<(), RelayError>
where
    T: AsyncWrite + Unpin + Send,
{
    let frame = encode_frame(chunk)?;
    io.write_all(&frame).await.map_err(io_error)?;
    Ok(())
}

/// Read one framed chunk. Returns `Ok(None)` on a clean end of stream.
pub async fn read_chunk<T>(io: &mut T) -> Result<Option<EncodedChunk>, RelayError>
where
    T: AsyncRead + Unpin + Send,
{
    let mut len_buf = [0u8; 4];
    match io.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(io_error(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RelayError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    io.read_exact(&mut body).await.map_err(io_error)?;
    decode_body(&body).map(Some)
}

/// Read framed chunks until the stream closes.
pub async fn read_all_chunks<T>(io: &mut T) -> Result<Vec<EncodedChunk>, RelayError>
where
    T: AsyncRead + Unpin + Send,
{
    let mut chunks = Vec::new();
    while let Some(chunk) = read_chunk(io).await? {
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn io_error(e: std::io::Error) -> RelayError {
    RelayError::CodecError {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(index: u16) -> EncodedChunk {
        EncodedChunk {
            segment: 1,
            index,
            payload_len: 96,
            data: vec![index as u8; 6],
            digest: [index as u8; 48],
        }
    }

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(&sample_chunk(3)).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        assert_eq!(frame[4], FRAME_VERSION);
    }

    #[tokio::test]
    async fn test_stream_of_frames() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let sent: Vec<EncodedChunk> = (0..5).map(sample_chunk).collect();
        let to_send = sent.clone();
        let writer = tokio::spawn(async move {
            for chunk in &to_send {
                write_chunk(&mut tx, chunk).await.unwrap();
            }
            // Dropping tx closes the stream.
        });
        let received = read_all_chunks(&mut rx).await.unwrap();
        writer.await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let mut frame = encode_frame(&sample_chunk(0)).unwrap();
        frame[4] = FRAME_VERSION + 1;
        let mut reader = frame.as_slice();
        assert_eq!(
            read_chunk(&mut reader).await,
            Err(RelayError::FrameVersionMismatch {
                got: FRAME_VERSION + 1,
                expected: FRAME_VERSION
            })
        );
    }

    #[tokio::test]
    async fn test_oversized_length_prefix() {
        let bytes = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
        let mut reader = &bytes[..];
        assert!(matches!(
            read_chunk(&mut reader).await,
            Err(RelayError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let frame = encode_frame(&sample_chunk(0)).unwrap();
        let mut reader = &frame[..frame.len() - 2];
        assert!(matches!(
            read_chunk(&mut reader).await,
            Err(RelayError::CodecError { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut reader: &[u8] = &[];
        assert_eq!(read_chunk(&mut reader).await, Ok(None));
    }
}
