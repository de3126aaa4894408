use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

use super::backend::{
    CaptureFormat, ChannelConfig, OpenError, SampleEncoding, SampleSource, SourceError,
};

/// A linear PCM WAV file loaded into memory
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub format: CaptureFormat,
    /// Interleaved sample bytes exactly as stored in the data chunk
    pub data: Vec<u8>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int {
            bail!("Only integer PCM is supported, got {:?}", spec.sample_format);
        }
        let Some(channels) = ChannelConfig::from_count(spec.channels) else {
            bail!("Only mono or stereo is supported, got {} channels", spec.channels);
        };
        let encoding = match spec.bits_per_sample {
            8 => SampleEncoding::Pcm8Bit,
            16 => SampleEncoding::Pcm16Bit,
            bits => bail!("Only 8-bit or 16-bit PCM is supported, got {}-bit", bits),
        };
        let format = CaptureFormat::new(spec.sample_rate, channels, encoding);

        // hound hands 8-bit samples back re-centred on zero; undo that so the
        // bytes match the data chunk
        let data: Vec<u8> = match encoding {
            SampleEncoding::Pcm8Bit => reader
                .into_samples::<i8>()
                .map(|s| s.map(|v| (v as i16 + 128) as u8))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleEncoding::Pcm16Bit => reader
                .into_samples::<i16>()
                .map(|s| s.map(i16::to_le_bytes))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?
                .concat(),
        };

        let duration_seconds = data.len() as f64 / format.byte_rate() as f64;

        info!(
            "Audio file loaded: {:.1}s, {}, {} data bytes",
            duration_seconds,
            format,
            data.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            format,
            data,
        })
    }

    /// Number of sample-time slices (samples per channel)
    pub fn sample_count(&self) -> usize {
        self.data.len() / self.format.block_align()
    }

    /// 16-bit samples, interleaved. Empty for 8-bit files.
    pub fn samples_i16(&self) -> Vec<i16> {
        match self.format.encoding {
            SampleEncoding::Pcm16Bit => self
                .data
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect(),
            SampleEncoding::Pcm8Bit => Vec::new(),
        }
    }
}

/// Capture source replaying the data chunk of a WAV file
///
/// The granted format is the file's own, whatever was requested.
pub struct WavFileSource {
    audio: AudioFile,
    frame_bytes: usize,
    offset: usize,
    realtime: bool,
    started: Option<Instant>,
    /// Offset at which `started` was taken
    anchor: usize,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>, buffer_duration_ms: u64) -> Result<Self, OpenError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OpenError::HardwareUnavailable(format!(
                "no such file: {}",
                path.display()
            )));
        }

        let audio =
            AudioFile::open(path).map_err(|e| OpenError::UnsupportedConfig(format!("{:#}", e)))?;
        let frame_bytes = audio.format.frame_bytes_for(buffer_duration_ms);

        Ok(Self {
            audio,
            frame_bytes,
            offset: 0,
            realtime: false,
            started: None,
            anchor: 0,
        })
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn pace(&mut self, end_offset: usize) {
        if !self.realtime {
            return;
        }

        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started
            + Duration::from_secs_f64(
                (end_offset - self.anchor) as f64 / self.audio.format.byte_rate() as f64,
            );
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl SampleSource for WavFileSource {
    fn granted(&self) -> CaptureFormat {
        self.audio.format
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let remaining = self.audio.data.len() - self.offset;
        if remaining == 0 {
            return Err(SourceError::EndOfStream);
        }

        let n = remaining.min(buf.len());
        self.pace(self.offset + n);
        buf[..n].copy_from_slice(&self.audio.data[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }

    fn suspend(&mut self, paused: bool) {
        if !paused {
            self.started = None;
            self.anchor = self.offset;
        }
    }

    fn name(&self) -> &str {
        &self.audio.path
    }
}
