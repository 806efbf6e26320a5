//! # Update Envelope
//!
//! ## Purpose
//!
//! Wraps one strategy update in the multipart layout published on the relay:
//!
//! ```text
//! [topic][empty][kind][empty][0x7F][payload frames…]
//! ```
//!
//! The topic comes first so subscribers can filter on frame 0 by prefix.
//! The kind byte selects the payload type; the `0x7F` sentinel marks where
//! the payload starts, which lets a receiver that has already stripped the
//! topic frame still find it.
//!
//! ## Kinds
//!
//! | Kind       | Byte | Payload        |
//! |------------|------|----------------|
//! | Initial    | 0    | `StepRecord`   |
//! | Action     | 1    | `StepRecord`   |
//! | Completion | 2    | `ResultRecord` |
//! | Error      | 4    | `ErrorInfo`    |

use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::trace;
use types::{ErrorInfo, ResultRecord, StepRecord};

use crate::error::{CodecError, CodecResult};
use crate::frame::{Frame, FrameCodec, FrameReader};

/// Payload demarcation byte
pub const PAYLOAD_SENTINEL: u8 = 0x7F;

/// Frames before the payload in a full envelope
pub const HEADER_FRAMES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum UpdateKind {
    Initial = 0,
    Action = 1,
    Completion = 2,
    Error = 4,
}

impl UpdateKind {
    /// Completion and Error end a topic's stream
    pub fn is_terminal(self) -> bool {
        matches!(self, UpdateKind::Completion | UpdateKind::Error)
    }
}

/// One decoded update, typed by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Initial(StepRecord),
    Action(StepRecord),
    Completion(ResultRecord),
    Error(ErrorInfo),
}

impl Update {
    pub fn kind(&self) -> UpdateKind {
        match self {
            Update::Initial(_) => UpdateKind::Initial,
            Update::Action(_) => UpdateKind::Action,
            Update::Completion(_) => UpdateKind::Completion,
            Update::Error(_) => UpdateKind::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    fn write_payload(&self, out: &mut Vec<Frame>) {
        match self {
            Update::Initial(step) | Update::Action(step) => step.write_frames(out),
            Update::Completion(result) => result.write_frames(out),
            Update::Error(info) => info.write_frames(out),
        }
    }

    fn payload_frames(&self) -> usize {
        match self {
            Update::Initial(step) | Update::Action(step) => step.frame_count(),
            Update::Completion(result) => result.frame_count(),
            Update::Error(info) => info.frame_count(),
        }
    }
}

/// Topic plus typed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub topic: String,
    pub update: Update,
}

impl UpdateEnvelope {
    pub fn new(topic: impl Into<String>, update: Update) -> Self {
        Self {
            topic: topic.into(),
            update,
        }
    }

    pub fn encode(&self) -> Vec<Frame> {
        encode(&self.topic, &self.update)
    }

    /// Decode a full envelope; the topic frame must be present
    pub fn decode(frames: &[Frame]) -> CodecResult<Self> {
        let header = decode_header(frames)?;
        let topic = header
            .topic
            .ok_or_else(|| CodecError::malformed_envelope("topic frame missing"))?;
        let update = decode_payload(header.kind, frames, header.payload_cursor)?;
        Ok(Self { topic, update })
    }
}

/// Topic and kind read from the front of an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// `None` when the frames arrived with the topic already stripped
    pub topic: Option<String>,
    pub kind: UpdateKind,
    /// Index of the first payload frame
    pub payload_cursor: usize,
}

/// Build the frames for `update` on `topic`
pub fn encode(topic: &str, update: &Update) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(HEADER_FRAMES + update.payload_frames());
    frames.push(Frame::from_text(topic));
    frames.push(Frame::empty());
    frames.push(Frame::from_byte(update.kind().into()));
    frames.push(Frame::empty());
    frames.push(Frame::from_byte(PAYLOAD_SENTINEL));
    update.write_payload(&mut frames);
    frames
}

/// Locate `[empty][kind][empty][0x7F]` at the front of `frames`, with or
/// without a leading topic frame.
pub fn decode_header(frames: &[Frame]) -> CodecResult<EnvelopeHeader> {
    let sentinel_at = if is_header_at(frames, 0) {
        3
    } else if is_header_at(frames, 1) {
        4
    } else {
        return Err(CodecError::malformed_envelope(format!(
            "no [empty][kind][empty][0x7F] header in {} frames",
            frames.len()
        )));
    };

    let value = frames[sentinel_at - 2].as_bytes()[0];
    let kind = UpdateKind::try_from(value).map_err(|_| CodecError::UnknownUpdateKind { value })?;

    let topic = if sentinel_at == 4 {
        let mut reader = FrameReader::new(frames);
        Some(reader.read_string("envelope topic")?)
    } else {
        None
    };

    Ok(EnvelopeHeader {
        topic,
        kind,
        payload_cursor: sentinel_at + 1,
    })
}

fn is_header_at(frames: &[Frame], start: usize) -> bool {
    frames.len() > start + 3
        && frames[start].is_empty()
        && frames[start + 1].len() == 1
        && frames[start + 2].is_empty()
        && frames[start + 3].is_single(PAYLOAD_SENTINEL)
}

/// Decode the payload for `kind` starting at `cursor`.
///
/// A single `0x7F` frame at `cursor` is skipped first, so callers may pass
/// either the sentinel position or the position after it. All remaining
/// frames must belong to the payload.
pub fn decode_payload(kind: UpdateKind, frames: &[Frame], cursor: usize) -> CodecResult<Update> {
    let mut reader = FrameReader::at(frames, cursor);
    if reader.peek().is_some_and(|f| f.is_single(PAYLOAD_SENTINEL)) {
        trace!(cursor, "skipping payload sentinel");
        reader.skip();
    }

    let update = match kind {
        UpdateKind::Initial => Update::Initial(StepRecord::read_frames(&mut reader)?),
        UpdateKind::Action => Update::Action(StepRecord::read_frames(&mut reader)?),
        UpdateKind::Completion => Update::Completion(ResultRecord::read_frames(&mut reader)?),
        UpdateKind::Error => Update::Error(ErrorInfo::read_frames(&mut reader)?),
    };

    if !reader.is_exhausted() {
        return Err(CodecError::TrailingFrames {
            consumed: reader.position(),
            total: frames.len(),
        });
    }
    Ok(update)
}
