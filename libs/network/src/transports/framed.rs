//! Multipart message framing over a byte stream.
//!
//! ```text
//! u32 LE frame_count
//! repeat frame_count: u32 LE length, length bytes
//! ```
//!
//! Frame payloads are read into a reusable buffer and split off as `Bytes`
//! without copying.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};
use codec::Frame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Result, TransportError};

/// Default upper bound for one multipart message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Writes multipart messages to a stream
pub struct MultipartWriter<W> {
    inner: W,
    buffer: BytesMut,
    messages_sent: u64,
}

impl<W: AsyncWrite + Unpin> MultipartWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(64 * 1024),
            messages_sent: 0,
        }
    }

    /// Encode and flush one message
    pub async fn send(&mut self, frames: &[Frame]) -> Result<()> {
        self.buffer.clear();
        self.buffer.put_u32_le(frame_len_u32(frames.len())?);
        for frame in frames {
            self.buffer.put_u32_le(frame_len_u32(frame.len())?);
            self.buffer.extend_from_slice(frame.as_bytes());
        }

        self.inner
            .write_all(&self.buffer)
            .await
            .map_err(|e| TransportError::network_with_source("Failed to write message", e))?;
        self.inner
            .flush()
            .await
            .map_err(|e| TransportError::network_with_source("Failed to flush stream", e))?;

        self.messages_sent += 1;
        trace!(
            frames = frames.len(),
            bytes = self.buffer.len(),
            "sent multipart message"
        );
        Ok(())
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Close the write side
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| TransportError::network_with_source("Failed to shut down stream", e))
    }
}

fn frame_len_u32(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| TransportError::protocol(format!("length {len} does not fit in u32")))
}

/// Reads multipart messages from a stream
pub struct MultipartReader<R> {
    inner: R,
    buffer: BytesMut,
    max_message_size: usize,
}

impl<R: AsyncRead + Unpin> MultipartReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_size(inner, DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(inner: R, max_message_size: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(64 * 1024),
            max_message_size,
        }
    }

    /// Read the next message. `Ok(None)` means the peer closed the stream
    /// cleanly between messages.
    pub async fn recv(&mut self) -> Result<Option<Vec<Frame>>> {
        let mut header = [0u8; 4];
        match self.inner.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(TransportError::network_with_source(
                    "Failed to read frame count",
                    e,
                ))
            }
        }

        let frame_count = LittleEndian::read_u32(&header) as usize;
        if frame_count.saturating_mul(4) > self.max_message_size {
            return Err(TransportError::protocol(format!(
                "Frame count {} exceeds maximum message size {}",
                frame_count, self.max_message_size
            )));
        }

        let mut frames = Vec::with_capacity(frame_count.min(64));
        let mut total = 0usize;
        for _ in 0..frame_count {
            self.inner
                .read_exact(&mut header)
                .await
                .map_err(|e| TransportError::network_with_source("Failed to read frame length", e))?;
            let len = LittleEndian::read_u32(&header) as usize;
            total = total.saturating_add(len);
            if total > self.max_message_size {
                return Err(TransportError::protocol(format!(
                    "Message size exceeds maximum {}",
                    self.max_message_size
                )));
            }

            self.buffer.resize(len, 0);
            self.inner
                .read_exact(&mut self.buffer[..])
                .await
                .map_err(|e| TransportError::network_with_source("Failed to read frame data", e))?;
            frames.push(Frame::from(self.buffer.split_to(len).freeze()));
        }

        trace!(frames = frame_count, bytes = total, "received multipart message");
        Ok(Some(frames))
    }
}
