//! Length-prefixed framing: `[u32 big-endian length][payload]`.
//!
//! Payloads carry UTF-8 JSON. Frames above [`MAX_FRAME_SIZE`] are rejected on
//! both ends so a garbage header cannot make a reader allocate gigabytes.

use crate::protocol::Message;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_SIZE: usize = 4;
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("payload is not a valid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
            _ => FrameError::Io(err),
        }
    }
}

impl FrameError {
    /// Bad header, oversized payload, or a payload that does not decode.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FrameError::MalformedFrame(_) | FrameError::Json(_))
    }
}

/// Prefixes `payload` with its big-endian length.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::MalformedFrame(format!(
            "payload of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parses the payload length from the first [`HEADER_SIZE`] bytes of `buf`.
///
/// Fails when fewer than four bytes are available; a caller reading from a
/// buffer should keep the bytes and retry once more have arrived.
pub fn decode_header(buf: &[u8]) -> Result<usize, FrameError> {
    let header: [u8; HEADER_SIZE] = buf
        .get(..HEADER_SIZE)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            FrameError::MalformedFrame(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            ))
        })?;

    let length = u32::from_be_bytes(header) as usize;
    if length > MAX_FRAME_SIZE {
        return Err(FrameError::MalformedFrame(format!(
            "announced payload of {} bytes exceeds the {} byte limit",
            length, MAX_FRAME_SIZE
        )));
    }
    Ok(length)
}

/// Splits the first complete frame off `buf`.
///
/// Returns the payload and the number of bytes consumed, or `None` while the
/// frame is still incomplete.
pub fn decode(buf: &[u8]) -> Result<Option<(&[u8], usize)>, FrameError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }

    let length = decode_header(buf)?;
    let end = HEADER_SIZE + length;
    if buf.len() < end {
        return Ok(None);
    }
    Ok(Some((&buf[HEADER_SIZE..end], end)))
}

/// Reads exactly `length` bytes. EOF before the last byte is `ConnectionClosed`.
pub async fn read_exact<R>(reader: &mut R, length: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let header = read_exact(reader, HEADER_SIZE).await?;
    let length = decode_header(&header)?;
    read_exact(reader, length).await
}

/// Writes an already encoded frame and flushes it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

pub fn encode_message(message: &Message) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(message)?;
    encode(&payload)
}

/// Decodes a payload. Non UTF-8 and non JSON input both surface as `Json`.
pub fn decode_message(payload: &[u8]) -> Result<Message, FrameError> {
    Ok(serde_json::from_slice(payload)?)
}
