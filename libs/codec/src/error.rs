//! Serialization errors for flat buffers, frame sequences and envelopes
//!
//! Every variant carries enough context (which record, which field, what
//! size was expected) to diagnose a bad message from a single log line.
//! A `CodecError` only ever invalidates the message being decoded; callers
//! log it and drop that message.

use thiserror::Error;

/// Decoding and encoding failures with diagnostic context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ends before the field being read
    #[error("Buffer too short: need {need} bytes, got {got} (context: {context})")]
    BufferTooShort {
        need: usize,
        got: usize,
        context: String,
    },

    /// Frame sequence ends before the field being read
    #[error("Missing frame {index} (context: {context})")]
    MissingFrame { index: usize, context: String },

    /// Frame length does not match the declared group arity
    #[error("Frame size mismatch: expected {expected} bytes, got {got} (context: {context})")]
    FrameSizeMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    /// Zero-length frame where a nested record must start
    #[error("Absent record where {context} was expected")]
    AbsentRecord { context: String },

    #[error("Invalid UTF-8 in {context}")]
    InvalidUtf8 { context: String },

    /// Negative string length or element count
    #[error("Negative length {length} (context: {context})")]
    NegativeLength { length: i32, context: String },

    /// String longer than a 32-bit signed length prefix can describe
    #[error("String of {len} bytes exceeds the i32 length prefix")]
    StringTooLong { len: usize },

    #[error("Unknown action kind byte {value}: valid values are 0-3")]
    UnknownActionKind { value: u8 },

    #[error("Unknown update kind byte {value}: valid values are 0, 1, 2, 4")]
    UnknownUpdateKind { value: u8 },

    /// No `[empty][kind][empty][0x7F]` header found
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Frames left over after the payload was decoded
    #[error("Trailing frames: payload ended at frame {consumed} of {total}")]
    TrailingFrames { consumed: usize, total: usize },

    /// Queue body that is neither 12 nor 20 bytes
    #[error("Invalid job descriptor length {got}: expected 12 or 20 bytes")]
    InvalidJobLength { got: usize },

    /// Decoded value violates a domain constraint
    #[error("Invalid value in {context}: {message}")]
    InvalidValue { context: String, message: String },
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    pub fn buffer_too_short(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::BufferTooShort {
            need,
            got,
            context: context.into(),
        }
    }

    pub fn missing_frame(index: usize, context: impl Into<String>) -> Self {
        Self::MissingFrame {
            index,
            context: context.into(),
        }
    }

    pub fn frame_size_mismatch(expected: usize, got: usize, context: impl Into<String>) -> Self {
        Self::FrameSizeMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    pub fn malformed_envelope(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Wrap a domain validation failure raised while rebuilding a record
    pub fn invalid_value(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            context: context.into(),
            message: err.to_string(),
        }
    }
}
