//! Loudness metering for live level feedback
//!
//! Levels are in dBFS computed from the mean absolute amplitude of the
//! first channel of an interleaved frame.

use super::backend::SampleEncoding;

pub const MIN_LEVEL_DB: f64 = -100.0;
pub const MAX_LEVEL_DB: f64 = 0.0;

/// Zero line of 8-bit capture
const PCM8_OFFSET: i32 = 127;

/// Level of one frame in dBFS, clamped to [`MIN_LEVEL_DB`, `MAX_LEVEL_DB`]
///
/// `frame` holds the persisted content of a frame only. Silence (including
/// an empty frame) reads as 0 dBFS rather than the floor; callers relying
/// on the meter for silence detection must special-case it.
pub fn compute_level_db(frame: &[u8], encoding: SampleEncoding, channels: u16) -> f64 {
    let stride = channels.max(1) as usize * encoding.byte_depth() as usize;
    let slices = frame.len() / stride;

    let mut sum = 0.0;
    for slice in frame.chunks_exact(stride) {
        let magnitude = match encoding {
            SampleEncoding::Pcm16Bit => i16::from_le_bytes([slice[0], slice[1]]) as i32,
            SampleEncoding::Pcm8Bit => slice[0] as i32 - PCM8_OFFSET,
        };
        sum += magnitude.abs() as f64;
    }

    let full_scale = match encoding {
        SampleEncoding::Pcm16Bit => i16::MAX as f64,
        SampleEncoding::Pcm8Bit => i8::MAX as f64,
    };

    let average = if slices > 0 {
        sum / slices as f64 / full_scale
    } else {
        0.0
    };

    let level = if average > 0.0 {
        20.0 * average.log10()
    } else {
        0.0
    };

    level.clamp(MIN_LEVEL_DB, MAX_LEVEL_DB)
}
