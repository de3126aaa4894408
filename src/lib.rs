pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod wav;

pub use audio::{
    AudioFile, CaptureFormat, CaptureRequest, ChannelConfig, DeviceOpener, DeviceSource,
    SampleEncoding, SampleSource, SourceOpener,
};
pub use config::{Config, RecorderSettings};
pub use error::{RecorderError, Result};
pub use session::{
    ControlOutcome, GrantedConfig, ProgressUpdate, RecorderEvent, RecorderState, RecordingConfig,
    StartedRecording, StopOutcome, StopReason, StopSummary, WavRecorder,
};
pub use wav::{WavHeader, HEADER_LEN};
