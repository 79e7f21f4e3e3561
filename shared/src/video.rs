//! Wire helpers for the video relay connection
//!
//! The video stream uses signed 32-bit big-endian length prefixes: two
//! nickname strings on connect, a single acknowledgement value back, then an
//! open-ended sequence of opaque frames in both directions.

use crate::codec::FrameError;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame the relay will accept or forward (5 MB).
pub const MAX_VIDEO_FRAME_SIZE: usize = 5_000_000;
/// Largest nickname accepted in the video handshake, in bytes.
pub const MAX_HANDSHAKE_STRING: usize = 256;
/// Acknowledgement value sent once the handshake is registered.
pub const VIDEO_ACK: i32 = 1;

/// Nicknames announced by a video client when it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoHandshake {
    pub nickname: String,
    pub opponent: String,
}

async fn read_len<R>(reader: &mut R, max: usize) -> Result<Option<usize>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_i32().await {
        Ok(len) => len,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len <= 0 {
        return Err(FrameError::InvalidLength(len as i64));
    }
    let len = len as usize;
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }
    Ok(Some(len))
}

async fn read_body<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(body),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FrameError::Closed),
        Err(e) => Err(e.into()),
    }
}

async fn read_string<R>(reader: &mut R) -> Result<String, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = read_len(reader, MAX_HANDSHAKE_STRING)
        .await?
        .ok_or(FrameError::Closed)?;
    let body = read_body(reader, len).await?;
    String::from_utf8(body).map_err(|_| FrameError::InvalidUtf8)
}

async fn write_string<W>(writer: &mut W, value: &str) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_i32(value.len() as i32).await?;
    writer.write_all(value.as_bytes()).await?;
    Ok(())
}

pub async fn read_handshake<R>(reader: &mut R) -> Result<VideoHandshake, FrameError>
where
    R: AsyncRead + Unpin,
{
    let nickname = read_string(reader).await?;
    let opponent = read_string(reader).await?;
    Ok(VideoHandshake { nickname, opponent })
}

pub async fn write_handshake<W>(
    writer: &mut W,
    handshake: &VideoHandshake,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    write_string(writer, &handshake.nickname).await?;
    write_string(writer, &handshake.opponent).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_ack<R>(reader: &mut R) -> Result<i32, FrameError>
where
    R: AsyncRead + Unpin,
{
    Ok(reader.read_i32().await?)
}

pub async fn write_ack<W>(writer: &mut W) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_i32(VIDEO_ACK).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one opaque frame. Returns `Ok(None)` when the peer closed the stream
/// between frames; a non-positive or oversized length is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    match read_len(reader, MAX_VIDEO_FRAME_SIZE).await? {
        Some(len) => read_body(reader, len).await.map(Some),
        None => Ok(None),
    }
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if frame.is_empty() || frame.len() > MAX_VIDEO_FRAME_SIZE {
        return Err(FrameError::InvalidLength(frame.len() as i64));
    }
    writer.write_i32(frame.len() as i32).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
