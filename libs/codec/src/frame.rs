//! # Multi-Frame Encoding
//!
//! ## Purpose
//!
//! A message on the publish/subscribe channel is an ordered list of frames
//! (independent byte strings). Records map onto frames field by field:
//!
//! - a group of `i32` fields read and written together packs into one
//!   combined frame of `4 × arity` little-endian bytes
//! - a string is one UTF-8 frame
//! - a single byte is a one-byte frame
//! - a nested record contributes its own frames inline
//!
//! Decoding walks the frame list with a single [`FrameReader`] cursor, so a
//! record knows where its own frames end and where the next one begins.
//!
//! ## Absent Values
//!
//! A zero-length frame is the "absent" sentinel. No string field in the data
//! model is optional, so an empty string frame decodes as `""`. A zero-length
//! frame where a nested record must begin is rejected with
//! [`CodecError::AbsentRecord`] rather than silently producing a default.

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{CodecError, CodecResult};

/// One frame of a multipart message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Frame(Bytes);

impl Frame {
    /// Zero-length frame
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn from_byte(value: u8) -> Self {
        Self(Bytes::copy_from_slice(&[value]))
    }

    pub fn from_text(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }

    /// Combined frame holding `values` back to back
    pub fn from_i32s(values: &[i32]) -> Self {
        let mut buf = vec![0u8; values.len() * 4];
        LittleEndian::write_i32_into(values, &mut buf);
        Self(Bytes::from(buf))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// True for a one-byte frame holding exactly `value`
    pub fn is_single(&self, value: u8) -> bool {
        self.0[..] == [value]
    }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Frame {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Frame encoding of one record
pub trait FrameCodec: Sized {
    /// Number of frames [`FrameCodec::write_frames`] appends
    fn frame_count(&self) -> usize;

    fn write_frames(&self, out: &mut Vec<Frame>);

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self>;

    fn frames(&self) -> Vec<Frame> {
        let mut out = Vec::with_capacity(self.frame_count());
        self.write_frames(&mut out);
        out
    }

    /// Decode one record starting at frame `cursor`, returning it and the
    /// index of the first frame after it
    fn from_frames(frames: &[Frame], cursor: usize) -> CodecResult<(Self, usize)> {
        let mut reader = FrameReader::at(frames, cursor);
        let value = Self::read_frames(&mut reader)?;
        Ok((value, reader.position()))
    }
}

/// Cursor over a frame sequence
pub struct FrameReader<'a> {
    frames: &'a [Frame],
    position: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(frames: &'a [Frame]) -> Self {
        Self::at(frames, 0)
    }

    pub fn at(frames: &'a [Frame], position: usize) -> Self {
        Self { frames, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.frames.len()
    }

    pub fn peek(&self) -> Option<&'a Frame> {
        self.frames.get(self.position)
    }

    pub fn skip(&mut self) {
        self.position += 1;
    }

    pub fn next_frame(&mut self, context: &str) -> CodecResult<&'a Frame> {
        let frames = self.frames;
        let frame = frames
            .get(self.position)
            .ok_or_else(|| CodecError::missing_frame(self.position, context))?;
        self.position += 1;
        Ok(frame)
    }

    /// Read a combined frame of exactly `N` integers.
    ///
    /// A zero-length frame here means the record that starts with this group
    /// is absent.
    pub fn read_i32s<const N: usize>(&mut self, context: &str) -> CodecResult<[i32; N]> {
        let frame = self.next_frame(context)?;
        if frame.is_empty() {
            return Err(CodecError::AbsentRecord {
                context: context.to_string(),
            });
        }
        if frame.len() != N * 4 {
            return Err(CodecError::frame_size_mismatch(N * 4, frame.len(), context));
        }
        let mut values = [0i32; N];
        LittleEndian::read_i32_into(frame.as_bytes(), &mut values);
        Ok(values)
    }

    pub fn read_i32(&mut self, context: &str) -> CodecResult<i32> {
        let [value] = self.read_i32s::<1>(context)?;
        Ok(value)
    }

    pub fn read_byte(&mut self, context: &str) -> CodecResult<u8> {
        let frame = self.next_frame(context)?;
        match frame.as_bytes() {
            [value] => Ok(*value),
            other => Err(CodecError::frame_size_mismatch(1, other.len(), context)),
        }
    }

    pub fn read_string(&mut self, context: &str) -> CodecResult<String> {
        let frame = self.next_frame(context)?;
        std::str::from_utf8(frame.as_bytes())
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 {
                context: context.to_string(),
            })
    }
}
