//! # Flat Binary Encoding
//!
//! ## Purpose
//!
//! Contiguous little-endian encoding for records that are stored or passed
//! around as a single byte buffer.
//!
//! ## Layout Rules
//!
//! - `i32`: 4 bytes little-endian
//! - string: `i32` byte length followed by UTF-8 bytes
//! - enum: one raw byte
//! - nested record: inlined with no outer length prefix
//!
//! Records are written into a caller-provided buffer at an offset and report
//! the offset just past what they wrote, so several records can be packed
//! back to back and read back in the same order with one running offset.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CodecError, CodecResult};

/// Flat encoding of one record
pub trait BinaryCodec: Sized {
    /// Exact number of bytes [`BinaryCodec::write_to`] produces
    fn encoded_len(&self) -> usize;

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()>;

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self>;

    /// Encode into a fresh buffer of exactly `encoded_len()` bytes
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len()];
        self.encode_into(&mut buf, 0)?;
        Ok(buf)
    }

    /// Encode at `offset`, returning `offset + encoded_len()`
    fn encode_into(&self, buf: &mut [u8], offset: usize) -> CodecResult<usize> {
        let mut writer = ByteWriter::at(buf, offset);
        self.write_to(&mut writer)?;
        Ok(writer.offset())
    }

    /// Decode one record at `offset`, returning it and the offset after it
    fn decode(buf: &[u8], offset: usize) -> CodecResult<(Self, usize)> {
        let mut reader = ByteReader::at(buf, offset);
        let value = Self::read_from(&mut reader)?;
        Ok((value, reader.offset()))
    }
}

/// Encoded size of a length-prefixed string
pub fn string_len(value: &str) -> usize {
    4 + value.len()
}

/// Bounds-checked cursor over a mutable buffer
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn at(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn reserve(&mut self, len: usize, context: &str) -> CodecResult<&mut [u8]> {
        let end = self.offset + len;
        if end > self.buf.len() {
            return Err(CodecError::buffer_too_short(
                end,
                self.buf.len(),
                format!("writing {context}"),
            ));
        }
        let slot = &mut self.buf[self.offset..end];
        self.offset = end;
        Ok(slot)
    }

    pub fn put_i32(&mut self, value: i32, context: &str) -> CodecResult<()> {
        LittleEndian::write_i32(self.reserve(4, context)?, value);
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8, context: &str) -> CodecResult<()> {
        self.reserve(1, context)?[0] = value;
        Ok(())
    }

    pub fn put_str(&mut self, value: &str, context: &str) -> CodecResult<()> {
        let len = i32::try_from(value.len())
            .map_err(|_| CodecError::StringTooLong { len: value.len() })?;
        self.put_i32(len, context)?;
        self.reserve(value.len(), context)?
            .copy_from_slice(value.as_bytes());
        Ok(())
    }
}

/// Bounds-checked cursor over an immutable buffer
pub struct ByteReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn at(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    fn take(&mut self, len: usize, context: &str) -> CodecResult<&'a [u8]> {
        let end = self.offset + len;
        if end > self.buf.len() {
            return Err(CodecError::buffer_too_short(end, self.buf.len(), context));
        }
        let buf = self.buf;
        let slice = &buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn get_i32(&mut self, context: &str) -> CodecResult<i32> {
        Ok(LittleEndian::read_i32(self.take(4, context)?))
    }

    pub fn get_u8(&mut self, context: &str) -> CodecResult<u8> {
        Ok(self.take(1, context)?[0])
    }

    /// Length prefix checked for sign; the bytes themselves are bounds-checked
    pub fn get_len(&mut self, context: &str) -> CodecResult<usize> {
        let length = self.get_i32(context)?;
        usize::try_from(length).map_err(|_| CodecError::NegativeLength {
            length,
            context: context.to_string(),
        })
    }

    pub fn get_str(&mut self, context: &str) -> CodecResult<String> {
        let len = self.get_len(context)?;
        let bytes = self.take(len, context)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 {
            context: context.to_string(),
        })
    }
}
