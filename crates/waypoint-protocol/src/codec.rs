//! Length-prefixed framing.
//!
//! Every response (and the IDENTIFY request body) is a 4-byte big-endian
//! signed length followed by exactly that many payload bytes. Command lines
//! themselves are plain `\n`-terminated text and are not framed.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum accepted frame payload (1 MiB). IDENTIFY bodies are a few hundred
/// bytes in practice.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame length exceeds [`MAX_FRAME_SIZE`].
    #[error("frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    TooLarge(usize),

    /// The peer sent a negative length prefix.
    #[error("negative frame size {0}")]
    Negative(i32),

    /// Underlying I/O failure, including EOF mid-frame.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Encode a payload into a framed buffer.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_i32(payload.len() as i32);
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Write one framed payload. The caller is responsible for flushing if the
/// writer is buffered.
///
/// # Errors
///
/// Returns an error if the write fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_frame(payload)).await?;
    writer.flush().await
}

/// Read one framed payload: length prefix, then exactly that many bytes.
///
/// Used by the server to consume an IDENTIFY body and by clients to consume
/// responses.
///
/// # Errors
///
/// Returns an error on I/O failure or an out-of-range length prefix.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_i32().await?;
    if len < 0 {
        return Err(FrameError::Negative(len));
    }
    let len = len as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}
