use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use super::file::WavFileSource;
use super::tone::ToneSource;

/// Channel layout of an interleaved capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelConfig {
    Mono,
    Stereo,
}

impl ChannelConfig {
    pub fn from_count(count: u16) -> Option<Self> {
        match count {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            _ => None,
        }
    }

    pub fn count(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Linear PCM sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    /// 8-bit unsigned, offset binary
    Pcm8Bit,
    /// 16-bit signed, little-endian
    Pcm16Bit,
}

impl SampleEncoding {
    pub fn from_byte_depth(byte_depth: u16) -> Option<Self> {
        match byte_depth {
            1 => Some(Self::Pcm8Bit),
            2 => Some(Self::Pcm16Bit),
            _ => None,
        }
    }

    /// Bytes per sample per channel
    pub fn byte_depth(self) -> u16 {
        match self {
            Self::Pcm8Bit => 1,
            Self::Pcm16Bit => 2,
        }
    }
}

/// Sample format of a capture stream (and of the WAV file written from it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel layout
    pub channels: ChannelConfig,
    /// Per-sample encoding
    pub encoding: SampleEncoding,
}

impl CaptureFormat {
    pub fn new(sample_rate: u32, channels: ChannelConfig, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate,
            channels,
            encoding,
        }
    }

    pub fn num_channels(&self) -> u16 {
        self.channels.count()
    }

    pub fn byte_depth(&self) -> u16 {
        self.encoding.byte_depth()
    }

    /// Bytes in one sample-time slice across all channels
    pub fn block_align(&self) -> usize {
        self.num_channels() as usize * self.byte_depth() as usize
    }

    /// Bytes of audio per second
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.block_align() as u64
    }

    /// Size in bytes of a frame holding `duration_ms` of audio (never zero)
    pub fn frame_bytes_for(&self, duration_ms: u64) -> usize {
        let samples = (self.sample_rate as u64 * duration_ms / 1000).max(1);
        samples as usize * self.block_align()
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {} channel(s), {}-bit",
            self.sample_rate,
            self.num_channels(),
            self.byte_depth() * 8
        )
    }
}

/// Which input to capture from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceSource {
    /// Default hardware input device
    Microphone,
    /// Synthetic sine tone
    Tone { frequency_hz: f64 },
    /// Synthetic digital silence
    Silence,
    /// Replay of an existing WAV file
    File(PathBuf),
}

impl Default for DeviceSource {
    fn default() -> Self {
        Self::Microphone
    }
}

/// What the recorder asks a device for
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub format: CaptureFormat,
    pub device: DeviceSource,
    /// Audio per device read, in milliseconds
    pub buffer_duration_ms: u64,
}

/// Failure to open a capture device
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("requested format not supported: {0}")]
    UnsupportedConfig(String),

    #[error("audio hardware unavailable: {0}")]
    HardwareUnavailable(String),
}

/// Failure while reading from an open capture device
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("capture source reached end of stream")]
    EndOfStream,

    #[error("capture read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture device failed: {0}")]
    Device(String),
}

/// An open capture device yielding interleaved PCM bytes
///
/// Reads block until audio is available. Short reads are permitted.
pub trait SampleSource: Send {
    /// Format actually granted by the device; may differ from the request
    fn granted(&self) -> CaptureFormat;

    /// Preferred read size in bytes
    fn frame_bytes(&self) -> usize;

    /// Read up to `buf.len()` bytes of interleaved samples
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError>;

    /// Called with `true` when the session pauses and `false` when it
    /// resumes. Audio the device produces in between must never be returned
    /// by a later read.
    fn suspend(&mut self, _paused: bool) {}

    /// Release the device. Called exactly once, after the last read.
    fn close(&mut self) {}

    /// Name for logging
    fn name(&self) -> &str;
}

/// Opens capture devices
///
/// The recorder holds one of these; tests substitute scripted devices.
pub trait SourceOpener: Send + Sync {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn SampleSource>, OpenError>;
}

/// Opener for the built-in devices
#[derive(Debug, Clone)]
pub struct DeviceOpener {
    /// Pace synthetic and file sources at real-time speed
    pub realtime: bool,
}

impl Default for DeviceOpener {
    fn default() -> Self {
        Self { realtime: true }
    }
}

impl SourceOpener for DeviceOpener {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn SampleSource>, OpenError> {
        let source: Box<dyn SampleSource> = match &request.device {
            DeviceSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    let source = super::microphone::MicrophoneSource::open(request)?;
                    Box::new(source)
                }

                #[cfg(not(feature = "microphone"))]
                {
                    return Err(OpenError::HardwareUnavailable(
                        "built without the `microphone` feature".to_string(),
                    ))
                }
            }

            DeviceSource::Tone { frequency_hz } => {
                if !frequency_hz.is_finite() || *frequency_hz <= 0.0 {
                    return Err(OpenError::UnsupportedConfig(format!(
                        "invalid tone frequency {}",
                        frequency_hz
                    )));
                }
                Box::new(
                    ToneSource::tone(request.format, *frequency_hz, request.buffer_duration_ms)
                        .with_realtime(self.realtime),
                )
            }

            DeviceSource::Silence => Box::new(
                ToneSource::silence(request.format, request.buffer_duration_ms)
                    .with_realtime(self.realtime),
            ),

            DeviceSource::File(path) => Box::new(
                WavFileSource::open(path, request.buffer_duration_ms)?.with_realtime(self.realtime),
            ),
        };

        info!(
            "Opened capture source '{}' (requested {}, granted {})",
            source.name(),
            request.format,
            source.granted()
        );

        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_block_align_and_byte_rate() {
        let format = CaptureFormat::new(44100, ChannelConfig::Stereo, SampleEncoding::Pcm16Bit);
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.byte_rate(), 176_400);

        let format = CaptureFormat::new(8000, ChannelConfig::Mono, SampleEncoding::Pcm8Bit);
        assert_eq!(format.block_align(), 1);
        assert_eq!(format.byte_rate(), 8000);
    }

    #[test]
    fn test_frame_bytes_for_duration() {
        let format = CaptureFormat::new(16000, ChannelConfig::Mono, SampleEncoding::Pcm16Bit);
        assert_eq!(format.frame_bytes_for(100), 3200);

        // Never zero, even for absurdly short buffers
        let format = CaptureFormat::new(100, ChannelConfig::Stereo, SampleEncoding::Pcm16Bit);
        assert_eq!(format.frame_bytes_for(1), 4);
    }

    #[test]
    fn test_channel_and_encoding_conversions() {
        assert_eq!(ChannelConfig::from_count(1), Some(ChannelConfig::Mono));
        assert_eq!(ChannelConfig::from_count(2), Some(ChannelConfig::Stereo));
        assert_eq!(ChannelConfig::from_count(3), None);
        assert_eq!(SampleEncoding::from_byte_depth(1), Some(SampleEncoding::Pcm8Bit));
        assert_eq!(SampleEncoding::from_byte_depth(2), Some(SampleEncoding::Pcm16Bit));
        assert_eq!(SampleEncoding::from_byte_depth(4), None);
    }

    #[cfg(not(feature = "microphone"))]
    #[test]
    fn test_microphone_unavailable_without_feature() {
        let request = CaptureRequest {
            format: CaptureFormat::new(44100, ChannelConfig::Mono, SampleEncoding::Pcm16Bit),
            device: DeviceSource::Microphone,
            buffer_duration_ms: 100,
        };

        let result = DeviceOpener::default().open(&request);
        assert!(matches!(result, Err(OpenError::HardwareUnavailable(_))));
    }
}
