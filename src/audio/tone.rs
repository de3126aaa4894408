// Synthetic capture source: sine tone or digital silence
//
// Behaves like a hardware device when paced in real time: each read blocks
// until the audio it returns would have been captured.

use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use super::backend::{CaptureFormat, SampleEncoding, SampleSource, SourceError};

/// Peak amplitude of generated tones, relative to full scale
const TONE_AMPLITUDE: f64 = 0.5;

pub struct ToneSource {
    format: CaptureFormat,
    frequency_hz: Option<f64>,
    frame_bytes: usize,
    /// Sample-time slices generated so far
    position: u64,
    realtime: bool,
    started: Option<Instant>,
    /// Position at which `started` was taken
    anchor: u64,
}

impl ToneSource {
    pub fn tone(format: CaptureFormat, frequency_hz: f64, buffer_duration_ms: u64) -> Self {
        Self::build(format, Some(frequency_hz), buffer_duration_ms)
    }

    pub fn silence(format: CaptureFormat, buffer_duration_ms: u64) -> Self {
        Self::build(format, None, buffer_duration_ms)
    }

    fn build(format: CaptureFormat, frequency_hz: Option<f64>, buffer_duration_ms: u64) -> Self {
        Self {
            format,
            frequency_hz,
            frame_bytes: format.frame_bytes_for(buffer_duration_ms),
            position: 0,
            realtime: false,
            started: None,
            anchor: 0,
        }
    }

    /// Block reads until the returned audio is due
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn amplitude_at(&self, position: u64) -> f64 {
        match self.frequency_hz {
            Some(hz) => {
                let t = position as f64 / self.format.sample_rate as f64;
                TONE_AMPLITUDE * (TAU * hz * t).sin()
            }
            None => 0.0,
        }
    }

    fn pace(&mut self, slices: u64) {
        if !self.realtime {
            return;
        }

        let started = *self.started.get_or_insert_with(Instant::now);
        let ahead = self.position + slices - self.anchor;
        let due = started + Duration::from_secs_f64(ahead as f64 / self.format.sample_rate as f64);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

/// Encode a normalized amplitude in [-1.0, 1.0] as one PCM sample
pub(crate) fn encode_sample(amplitude: f64, encoding: SampleEncoding, out: &mut Vec<u8>) {
    let amplitude = amplitude.clamp(-1.0, 1.0);
    match encoding {
        SampleEncoding::Pcm16Bit => {
            let value = (amplitude * i16::MAX as f64).round() as i16;
            out.extend_from_slice(&value.to_le_bytes());
        }
        SampleEncoding::Pcm8Bit => {
            // 127 is the zero line for 8-bit capture
            let value = (127.0 + amplitude * 127.0).round() as u8;
            out.push(value);
        }
    }
}

impl SampleSource for ToneSource {
    fn granted(&self) -> CaptureFormat {
        self.format
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let block_align = self.format.block_align();
        let slices = (buf.len() / block_align) as u64;
        if slices == 0 {
            return Ok(0);
        }

        self.pace(slices);

        let channels = self.format.num_channels();
        let mut bytes = Vec::with_capacity(slices as usize * block_align);
        for offset in 0..slices {
            let amplitude = self.amplitude_at(self.position + offset);
            for _ in 0..channels {
                encode_sample(amplitude, self.format.encoding, &mut bytes);
            }
        }

        self.position += slices;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn suspend(&mut self, paused: bool) {
        // Pacing restarts on resume so the paused span is not replayed in a burst
        if !paused {
            self.started = None;
            self.anchor = self.position;
        }
    }

    fn name(&self) -> &str {
        if self.frequency_hz.is_some() {
            "synthetic tone"
        } else {
            "synthetic silence"
        }
    }
}
