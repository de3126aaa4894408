pub mod backend;
pub mod file;
pub mod frame;
pub mod handoff;
pub mod meter;
pub mod tone;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{
    CaptureFormat, CaptureRequest, ChannelConfig, DeviceOpener, DeviceSource, OpenError,
    SampleEncoding, SampleSource, SourceError, SourceOpener,
};
pub use file::{AudioFile, WavFileSource};
pub use frame::{FrameProcessor, ProcessedFrame};
pub use meter::{compute_level_db, MAX_LEVEL_DB, MIN_LEVEL_DB};
pub use tone::ToneSource;
