use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::frame::WARM_UP_READS;
use crate::audio::{CaptureFormat, ChannelConfig, DeviceSource, SampleEncoding};
use crate::config::RecorderSettings;
use crate::error::{RecorderError, Result};

/// Hard ceiling on any recording's length: two hours
pub const ABSOLUTE_MAX_DURATION_SECS: f64 = 7200.0;

/// Highest accepted sample rate; keeps the WAV byte rate within 32 bits
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// File name used when no destination is given
pub const DEFAULT_FILE_NAME: &str = "recording.wav";

/// Placeholder callers may pass to ask for the default destination
const DEFAULT_PLACEHOLDER: &str = "DEFAULT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoder {
    Lpcm,
    Aac,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Wav,
    Mpeg4,
}

/// A request to start recording
///
/// Every field is optional; unset fields take the recorder's configured
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Output path. Absolute and `./`/`../` paths are used as given, bare
    /// names go under the recordings directory. Must end in `.wav`.
    pub destination: Option<String>,
    pub sample_rate: Option<u32>,
    /// 1 (mono) or 2 (stereo)
    pub channels: Option<u16>,
    /// 1 (8-bit) or 2 (16-bit)
    pub byte_depth: Option<u16>,
    /// Clamped to [`ABSOLUTE_MAX_DURATION_SECS`]
    pub max_duration_secs: Option<f64>,
    pub metering_enabled: Option<bool>,
    pub subscription_duration_ms: Option<u64>,
    pub device: Option<DeviceSource>,
    /// Forced to `Lpcm` for WAV output; anything else is rejected
    pub encoder: Option<AudioEncoder>,
    /// Forced to `Wav` for WAV output; anything else is rejected
    pub output_format: Option<OutputFormat>,
}

/// A recording request with defaults applied and rules enforced
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub destination: PathBuf,
    /// Requested format; the device may grant a different one
    pub format: CaptureFormat,
    pub max_duration: Duration,
    pub metering_enabled: bool,
    pub subscription_duration: Duration,
    pub device: DeviceSource,
    pub buffer_duration_ms: u64,
}

impl RecordingConfig {
    pub fn resolve(
        &self,
        settings: &RecorderSettings,
        subscription_default: Duration,
    ) -> Result<ResolvedConfig> {
        let destination =
            resolve_destination(self.destination.as_deref(), &settings.recordings_path);
        if !has_wav_extension(&destination) {
            return Err(RecorderError::Config(format!(
                "only WAV output is supported, got {}",
                destination.display()
            )));
        }

        if let Some(encoder) = self.encoder.filter(|e| *e != AudioEncoder::Lpcm) {
            return Err(RecorderError::Config(format!(
                "encoder {:?} contradicts WAV output (LPCM only)",
                encoder
            )));
        }
        if let Some(format) = self.output_format.filter(|f| *f != OutputFormat::Wav) {
            return Err(RecorderError::Config(format!(
                "output format {:?} contradicts WAV output",
                format
            )));
        }

        let sample_rate = self.sample_rate.unwrap_or(settings.sample_rate);
        if sample_rate == 0 {
            return Err(RecorderError::Config("sample rate must be positive".to_string()));
        }
        if sample_rate > MAX_SAMPLE_RATE {
            return Err(RecorderError::Config(format!(
                "sample rate {} exceeds {} Hz",
                sample_rate, MAX_SAMPLE_RATE
            )));
        }

        let channel_count = self.channels.unwrap_or(settings.channels);
        let channels = ChannelConfig::from_count(channel_count).ok_or_else(|| {
            RecorderError::Config(format!("channels must be 1 or 2, got {}", channel_count))
        })?;

        let byte_depth = self.byte_depth.unwrap_or(settings.byte_depth);
        let encoding = SampleEncoding::from_byte_depth(byte_depth).ok_or_else(|| {
            RecorderError::Config(format!("byte depth must be 1 or 2, got {}", byte_depth))
        })?;

        let max_duration_secs = self.max_duration_secs.unwrap_or(settings.max_duration_secs);
        if !max_duration_secs.is_finite() || max_duration_secs <= 0.0 {
            return Err(RecorderError::Config(format!(
                "max duration must be a positive number of seconds, got {}",
                max_duration_secs
            )));
        }
        let max_duration =
            Duration::from_secs_f64(max_duration_secs.min(ABSOLUTE_MAX_DURATION_SECS));

        let subscription_duration = match self.subscription_duration_ms {
            Some(ms) => Duration::from_millis(ms),
            None => subscription_default,
        };
        if subscription_duration.is_zero() {
            return Err(RecorderError::Config(
                "progress interval must be positive".to_string(),
            ));
        }

        if settings.buffer_duration_ms == 0 {
            return Err(RecorderError::Config(
                "buffer duration must be positive".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            destination,
            format: CaptureFormat::new(sample_rate, channels, encoding),
            max_duration,
            metering_enabled: self.metering_enabled.unwrap_or(settings.metering_enabled),
            subscription_duration,
            device: self.device.clone().unwrap_or_default(),
            buffer_duration_ms: settings.buffer_duration_ms,
        })
    }
}

/// Sample budget of a recording: whole sample-time slices in `max_duration`
pub fn max_sample_count(sample_rate: u32, max_duration: Duration) -> u64 {
    let ceiling = Duration::from_secs_f64(ABSOLUTE_MAX_DURATION_SECS);
    (sample_rate as f64 * max_duration.min(ceiling).as_secs_f64()).floor() as u64
}

/// Wall-clock backstop for a session limited to `max_duration`
///
/// Leaves room for the discarded warm-up reads and one more read, so that a
/// device delivering in real time always fills its sample budget first.
pub fn wall_clock_limit(
    max_duration: Duration,
    format: CaptureFormat,
    frame_bytes: usize,
) -> Duration {
    let read_bytes = frame_bytes.max(format.block_align());
    let per_read = Duration::from_secs_f64(read_bytes as f64 / format.byte_rate().max(1) as f64);
    max_duration + per_read * (WARM_UP_READS + 1)
}

fn resolve_destination(raw: Option<&str>, recordings_dir: &Path) -> PathBuf {
    match raw.map(str::trim) {
        None | Some("") | Some(DEFAULT_PLACEHOLDER) => recordings_dir.join(DEFAULT_FILE_NAME),
        Some(raw) => {
            let raw = raw.strip_prefix("file://").unwrap_or(raw);
            if raw.starts_with('/') || raw.starts_with("./") || raw.starts_with("../") {
                PathBuf::from(raw)
            } else {
                recordings_dir.join(raw)
            }
        }
    }
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}
