//! Length-prefixed framing for packets carried over a TCP byte stream.
//!
//! Each frame is a 4-byte big-endian payload length followed by the payload.

use crate::protocol::MAX_PACKET_SIZE;
use std::fmt;

pub const HEADER_LEN: usize = 4;

/// Prefixes `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PACKET_SIZE {
        return Err(FrameError::Oversized {
            len: payload.len(),
            limit: MAX_PACKET_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Accumulates stream bytes and splits them into complete frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete frame payload, `Ok(None)` if more bytes are needed.
    ///
    /// A header announcing a payload larger than [`MAX_PACKET_SIZE`] poisons
    /// the stream: there is no way to resynchronise, so the caller must drop
    /// the connection.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buffer[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > MAX_PACKET_SIZE {
            return Err(FrameError::Oversized {
                len,
                limit: MAX_PACKET_SIZE,
            });
        }

        if self.buffer.len() < HEADER_LEN + len {
            return Ok(None);
        }

        let payload = self.buffer[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.buffer.drain(..HEADER_LEN + len);
        Ok(Some(payload))
    }

    /// Bytes received but not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    Oversized { len: usize, limit: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oversized { len, limit } => {
                write!(f, "frame of {len} bytes exceeds {limit} byte limit")
            }
        }
    }
}

impl std::error::Error for FrameError {}
