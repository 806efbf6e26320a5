//! Queue body format for [`JobDescriptor`].
//!
//! Five little-endian `i32`s: first capacity, second capacity, goal, start
//! delay (ms), work delay (ms). Producers that predate the delay fields send
//! only the first three (12 bytes); those jobs start immediately and run
//! without pacing.

use byteorder::{ByteOrder, LittleEndian};
use types::JobDescriptor;

use crate::error::{CodecError, CodecResult};

/// Body length without the delay fields
pub const SHORT_JOB_LEN: usize = 12;
/// Body length with both delay fields
pub const FULL_JOB_LEN: usize = 20;

/// Encode the full 20-byte form
pub fn encode(job: &JobDescriptor) -> Vec<u8> {
    let mut body = vec![0u8; FULL_JOB_LEN];
    LittleEndian::write_i32_into(
        &[
            job.first_capacity,
            job.second_capacity,
            job.goal_volume,
            job.start_delay_ms,
            job.work_delay_ms,
        ],
        &mut body,
    );
    body
}

/// Encode the legacy 12-byte form, dropping the delay fields
pub fn encode_short(job: &JobDescriptor) -> Vec<u8> {
    let mut body = vec![0u8; SHORT_JOB_LEN];
    LittleEndian::write_i32_into(
        &[job.first_capacity, job.second_capacity, job.goal_volume],
        &mut body,
    );
    body
}

/// Decode a 12- or 20-byte body. Values are not range-checked here; see
/// [`JobDescriptor::validate`].
pub fn decode(body: &[u8]) -> CodecResult<JobDescriptor> {
    match body.len() {
        SHORT_JOB_LEN => {
            let mut values = [0i32; 3];
            LittleEndian::read_i32_into(body, &mut values);
            Ok(JobDescriptor::new(values[0], values[1], values[2]))
        }
        FULL_JOB_LEN => {
            let mut values = [0i32; 5];
            LittleEndian::read_i32_into(body, &mut values);
            Ok(JobDescriptor::new(values[0], values[1], values[2]).with_delays(values[3], values[4]))
        }
        got => Err(CodecError::InvalidJobLength { got }),
    }
}
