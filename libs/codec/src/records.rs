//! Flat and frame encodings of the puzzle records.
//!
//! | Record            | Flat layout                                                    | Frames |
//! |-------------------|----------------------------------------------------------------|--------|
//! | Container         | capacity, fill, name                                            | `[capacity,fill]`, name |
//! | ReservoirSnapshot | drawn, discharged                                               | `[drawn,discharged]` |
//! | ProblemState      | count, containers…, reservoir                                   | `[count]`, containers…, reservoir |
//! | StepRecord        | strategy, actor, action, step, amount, description, state       | strategy, actor, action, `[step,amount]`, description, state |
//! | ResultRecord      | step count, reservoir                                           | `[step count]`, reservoir |
//! | ErrorInfo         | kind tag, message                                               | kind tag, message |

use types::{
    ActionKind, Container, ErrorInfo, ProblemState, ReservoirSnapshot, ResultRecord, StepRecord,
};

use crate::binary::{string_len, BinaryCodec, ByteReader, ByteWriter};
use crate::error::{CodecError, CodecResult};
use crate::frame::{Frame, FrameCodec, FrameReader};

/// Smallest flat container: capacity, fill and an empty name
const MIN_CONTAINER_LEN: usize = 12;

fn action_from_byte(value: u8) -> CodecResult<ActionKind> {
    ActionKind::try_from(value).map_err(|_| CodecError::UnknownActionKind { value })
}

/// Counters the data model keeps at zero or above
fn non_negative(value: i32, field: &str) -> CodecResult<i32> {
    if value < 0 {
        return Err(CodecError::invalid_value(field, format!("{value} is negative")));
    }
    Ok(value)
}

fn container_count(count: i32, context: &str) -> CodecResult<usize> {
    usize::try_from(count).map_err(|_| CodecError::NegativeLength {
        length: count,
        context: context.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Container

impl BinaryCodec for Container {
    fn encoded_len(&self) -> usize {
        8 + string_len(self.name())
    }

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.put_i32(self.capacity(), "Container.capacity")?;
        writer.put_i32(self.fill(), "Container.fill")?;
        writer.put_str(self.name(), "Container.name")
    }

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        let capacity = reader.get_i32("Container.capacity")?;
        let fill = reader.get_i32("Container.fill")?;
        let name = reader.get_str("Container.name")?;
        Container::with_fill(capacity, fill, name).map_err(|e| CodecError::invalid_value("Container", e))
    }
}

impl FrameCodec for Container {
    fn frame_count(&self) -> usize {
        2
    }

    fn write_frames(&self, out: &mut Vec<Frame>) {
        out.push(Frame::from_i32s(&[self.capacity(), self.fill()]));
        out.push(Frame::from_text(self.name()));
    }

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self> {
        let [capacity, fill] = reader.read_i32s::<2>("Container capacity/fill")?;
        let name = reader.read_string("Container.name")?;
        Container::with_fill(capacity, fill, name).map_err(|e| CodecError::invalid_value("Container", e))
    }
}

// ---------------------------------------------------------------------------
// ReservoirSnapshot

impl BinaryCodec for ReservoirSnapshot {
    fn encoded_len(&self) -> usize {
        8
    }

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.put_i32(self.volume_drawn, "ReservoirSnapshot.volume_drawn")?;
        writer.put_i32(self.volume_discharged, "ReservoirSnapshot.volume_discharged")
    }

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        let drawn = reader.get_i32("ReservoirSnapshot.volume_drawn")?;
        let discharged = reader.get_i32("ReservoirSnapshot.volume_discharged")?;
        ReservoirSnapshot::new(drawn, discharged)
            .map_err(|e| CodecError::invalid_value("ReservoirSnapshot", e))
    }
}

impl FrameCodec for ReservoirSnapshot {
    fn frame_count(&self) -> usize {
        1
    }

    fn write_frames(&self, out: &mut Vec<Frame>) {
        out.push(Frame::from_i32s(&[self.volume_drawn, self.volume_discharged]));
    }

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self> {
        let [drawn, discharged] = reader.read_i32s::<2>("ReservoirSnapshot drawn/discharged")?;
        ReservoirSnapshot::new(drawn, discharged)
            .map_err(|e| CodecError::invalid_value("ReservoirSnapshot", e))
    }
}

// ---------------------------------------------------------------------------
// ProblemState

impl BinaryCodec for ProblemState {
    fn encoded_len(&self) -> usize {
        4 + self
            .containers
            .iter()
            .map(BinaryCodec::encoded_len)
            .sum::<usize>()
            + self.reservoir.encoded_len()
    }

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        let count = i32::try_from(self.containers.len()).map_err(|_| {
            CodecError::invalid_value("ProblemState", "too many containers")
        })?;
        writer.put_i32(count, "ProblemState.count")?;
        for container in &self.containers {
            container.write_to(writer)?;
        }
        self.reservoir.write_to(writer)
    }

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        let count = container_count(reader.get_i32("ProblemState.count")?, "ProblemState.count")?;
        // Reject counts the buffer cannot possibly hold before allocating
        let need = count.saturating_mul(MIN_CONTAINER_LEN);
        if need > reader.remaining() {
            return Err(CodecError::buffer_too_short(
                reader.offset().saturating_add(need),
                reader.offset() + reader.remaining(),
                "ProblemState.containers",
            ));
        }
        let containers = (0..count)
            .map(|_| Container::read_from(reader))
            .collect::<CodecResult<Vec<_>>>()?;
        let reservoir = ReservoirSnapshot::read_from(reader)?;
        Ok(ProblemState::new(containers, reservoir))
    }
}

impl FrameCodec for ProblemState {
    fn frame_count(&self) -> usize {
        1 + self
            .containers
            .iter()
            .map(FrameCodec::frame_count)
            .sum::<usize>()
            + self.reservoir.frame_count()
    }

    fn write_frames(&self, out: &mut Vec<Frame>) {
        // Container counts are tiny; the flat encoder checks the conversion
        out.push(Frame::from_i32s(&[self.containers.len() as i32]));
        for container in &self.containers {
            container.write_frames(out);
        }
        self.reservoir.write_frames(out);
    }

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self> {
        let count = container_count(reader.read_i32("ProblemState.count")?, "ProblemState.count")?;
        let mut containers = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            containers.push(Container::read_frames(reader)?);
        }
        let reservoir = ReservoirSnapshot::read_frames(reader)?;
        Ok(ProblemState::new(containers, reservoir))
    }
}

// ---------------------------------------------------------------------------
// StepRecord

impl BinaryCodec for StepRecord {
    fn encoded_len(&self) -> usize {
        string_len(&self.strategy_name)
            + self.actor.encoded_len()
            + 1
            + 8
            + string_len(&self.description)
            + self.ending_state.encoded_len()
    }

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.put_str(&self.strategy_name, "StepRecord.strategy_name")?;
        self.actor.write_to(writer)?;
        writer.put_u8(self.action.into(), "StepRecord.action")?;
        writer.put_i32(self.step_number, "StepRecord.step_number")?;
        writer.put_i32(self.amount, "StepRecord.amount")?;
        writer.put_str(&self.description, "StepRecord.description")?;
        self.ending_state.write_to(writer)
    }

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        Ok(StepRecord {
            strategy_name: reader.get_str("StepRecord.strategy_name")?,
            actor: Container::read_from(reader)?,
            action: action_from_byte(reader.get_u8("StepRecord.action")?)?,
            step_number: non_negative(reader.get_i32("StepRecord.step_number")?, "StepRecord.step_number")?,
            amount: non_negative(reader.get_i32("StepRecord.amount")?, "StepRecord.amount")?,
            description: reader.get_str("StepRecord.description")?,
            ending_state: ProblemState::read_from(reader)?,
        })
    }
}

impl FrameCodec for StepRecord {
    fn frame_count(&self) -> usize {
        4 + self.actor.frame_count() + self.ending_state.frame_count()
    }

    fn write_frames(&self, out: &mut Vec<Frame>) {
        out.push(Frame::from_text(&self.strategy_name));
        self.actor.write_frames(out);
        out.push(Frame::from_byte(self.action.into()));
        out.push(Frame::from_i32s(&[self.step_number, self.amount]));
        out.push(Frame::from_text(&self.description));
        self.ending_state.write_frames(out);
    }

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self> {
        let strategy_name = reader.read_string("StepRecord.strategy_name")?;
        let actor = Container::read_frames(reader)?;
        let action = action_from_byte(reader.read_byte("StepRecord.action")?)?;
        let [step_number, amount] = reader.read_i32s::<2>("StepRecord step/amount")?;
        let step_number = non_negative(step_number, "StepRecord.step_number")?;
        let amount = non_negative(amount, "StepRecord.amount")?;
        let description = reader.read_string("StepRecord.description")?;
        let ending_state = ProblemState::read_frames(reader)?;
        Ok(StepRecord {
            strategy_name,
            actor,
            action,
            step_number,
            amount,
            description,
            ending_state,
        })
    }
}

// ---------------------------------------------------------------------------
// ResultRecord

impl BinaryCodec for ResultRecord {
    fn encoded_len(&self) -> usize {
        4 + self.ending_reservoir.encoded_len()
    }

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.put_i32(self.step_count, "ResultRecord.step_count")?;
        self.ending_reservoir.write_to(writer)
    }

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        Ok(ResultRecord {
            step_count: non_negative(reader.get_i32("ResultRecord.step_count")?, "ResultRecord.step_count")?,
            ending_reservoir: ReservoirSnapshot::read_from(reader)?,
        })
    }
}

impl FrameCodec for ResultRecord {
    fn frame_count(&self) -> usize {
        1 + self.ending_reservoir.frame_count()
    }

    fn write_frames(&self, out: &mut Vec<Frame>) {
        out.push(Frame::from_i32s(&[self.step_count]));
        self.ending_reservoir.write_frames(out);
    }

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self> {
        Ok(ResultRecord {
            step_count: non_negative(reader.read_i32("ResultRecord.step_count")?, "ResultRecord.step_count")?,
            ending_reservoir: ReservoirSnapshot::read_frames(reader)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ErrorInfo

impl BinaryCodec for ErrorInfo {
    fn encoded_len(&self) -> usize {
        string_len(&self.kind_tag) + string_len(&self.message)
    }

    fn write_to(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.put_str(&self.kind_tag, "ErrorInfo.kind_tag")?;
        writer.put_str(&self.message, "ErrorInfo.message")
    }

    fn read_from(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        let kind_tag = reader.get_str("ErrorInfo.kind_tag")?;
        let message = reader.get_str("ErrorInfo.message")?;
        Ok(ErrorInfo::new(kind_tag, message))
    }
}

impl FrameCodec for ErrorInfo {
    fn frame_count(&self) -> usize {
        2
    }

    fn write_frames(&self, out: &mut Vec<Frame>) {
        out.push(Frame::from_text(&self.kind_tag));
        out.push(Frame::from_text(&self.message));
    }

    fn read_frames(reader: &mut FrameReader<'_>) -> CodecResult<Self> {
        let kind_tag = reader.read_string("ErrorInfo.kind_tag")?;
        let message = reader.read_string("ErrorInfo.message")?;
        Ok(ErrorInfo::new(kind_tag, message))
    }
}
