//! Non-blocking framed TCP stream shared by server peers and clients.
//!
//! Nothing here ever awaits socket readiness: reads and writes use tokio's
//! `try_read`/`try_write`, so a caller polls once and moves on when the
//! socket would block. Outbound frames are queued in a bounded buffer and
//! flushed opportunistically; a frame that does not fit is dropped.

use crate::frame::{encode_frame, FrameBuffer, FrameError};
use log::{debug, warn};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Default cap on bytes queued for a single connection.
pub const DEFAULT_MAX_OUTBOUND: usize = 256 * 1024;

const READ_CHUNK: usize = 4096;

/// Outcome of queueing a frame for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Queued,
    Dropped,
}

pub struct FramedStream {
    stream: TcpStream,
    inbound: FrameBuffer,
    outbound: Vec<u8>,
    max_outbound: usize,
}

impl FramedStream {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_max_outbound(stream, DEFAULT_MAX_OUTBOUND)
    }

    pub fn with_max_outbound(stream: TcpStream, max_outbound: usize) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to disable Nagle on stream: {}", e);
        }

        Self {
            stream,
            inbound: FrameBuffer::new(),
            outbound: Vec::new(),
            max_outbound,
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Returns the next complete frame, reading whatever the socket has
    /// available. `Ok(None)` means no full frame is buffered yet.
    pub fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(frame) = self.inbound.next_frame()? {
            return Ok(Some(frame));
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(len) => {
                    self.inbound.extend(&chunk[..len]);
                    if let Some(frame) = self.inbound.next_frame()? {
                        return Ok(Some(frame));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    /// Queues one payload and tries to push queued bytes to the socket.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<SendStatus, TransportError> {
        let frame = encode_frame(payload)?;

        if self.outbound.len() + frame.len() > self.max_outbound {
            warn!(
                "Outbound queue full ({} bytes), dropping {} byte frame",
                self.outbound.len(),
                frame.len()
            );
            return Ok(SendStatus::Dropped);
        }

        self.outbound.extend_from_slice(&frame);
        self.flush()?;
        Ok(SendStatus::Queued)
    }

    /// Writes as much of the outbound queue as the socket accepts right now.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        while !self.outbound.is_empty() {
            match self.stream.try_write(&self.outbound) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(len) => {
                    self.outbound.drain(..len);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        Ok(())
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }
}

#[derive(Debug)]
pub enum TransportError {
    /// The remote end closed the connection.
    Closed,
    Io(io::Error),
    Frame(FrameError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed by peer"),
            Self::Io(e) => write!(f, "socket error: {e}"),
            Self::Frame(e) => write!(f, "framing error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Closed => None,
            Self::Io(e) => Some(e),
            Self::Frame(e) => Some(e),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FrameError> for TransportError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}
