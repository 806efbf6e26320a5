//! # Bucket Puzzle Wire Codec
//!
//! Encoding rules for everything that leaves a process:
//!
//! - [`binary`]: flat little-endian buffers with offset-returning
//!   encode/decode, for records stored or passed as one blob
//! - [`frame`]: multi-frame encoding used on the publish/subscribe relay
//! - [`records`]: both encodings for every puzzle record
//! - [`job`]: the 12/20-byte queue body for `JobDescriptor`
//! - [`envelope`]: `[topic][empty][kind][empty][0x7F][payload…]` update
//!   messages and the typed [`Update`] they decode to
//!
//! Serialization failures are reported as [`CodecError`] and only ever
//! invalidate the message being decoded.

pub mod binary;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod job;
pub mod records;

pub use binary::{BinaryCodec, ByteReader, ByteWriter};
pub use envelope::{
    decode_header, decode_payload, EnvelopeHeader, Update, UpdateEnvelope, UpdateKind,
    PAYLOAD_SENTINEL,
};
pub use error::{CodecError, CodecResult};
pub use frame::{Frame, FrameCodec, FrameReader};
