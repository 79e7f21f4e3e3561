//! Length-prefixed framing for the game protocol
//!
//! Each frame is a 4-byte big-endian body length followed by the bincode
//! encoding of one `GameMessage`. Decoding is split from reading so that a
//! frame with a garbled body can be reported to the peer without losing
//! stream synchronisation.

use crate::GameMessage;
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted game message body in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] bincode::Error),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
    #[error("invalid frame length {0}")]
    InvalidLength(i64),
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
    #[error("connection closed")]
    Closed,
}

impl FrameError {
    /// True when the stream can no longer be trusted and must be closed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FrameError::Decode(_))
    }
}

/// Serializes a message into a complete frame, length prefix included.
pub fn encode_message(message: &GameMessage) -> Result<Vec<u8>, FrameError> {
    let body = bincode::serialize(message).map_err(FrameError::Encode)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(FrameError::TooLarge {
            len: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_message(body: &[u8]) -> Result<GameMessage, FrameError> {
    bincode::deserialize(body).map_err(FrameError::Decode)
}

/// Reads one raw frame body. Returns `Ok(None)` when the peer closed the stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(FrameError::InvalidLength(0));
    }
    if len > MAX_MESSAGE_SIZE {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(Some(body)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FrameError::Closed),
        Err(e) => Err(e.into()),
    }
}

/// Reads and decodes one message. Returns `Ok(None)` on a clean close.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<GameMessage>, FrameError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(body) => decode_message(&body).map(Some),
        None => Ok(None),
    }
}

pub async fn write_message<W>(writer: &mut W, message: &GameMessage) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_message(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
