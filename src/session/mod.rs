//! Recording session management
//!
//! This module provides the `WavRecorder` that manages:
//! - The recorder state machine (idle, recording, paused, stopping)
//! - The capture loop that feeds the sample spool
//! - Progress events and the terminal stop event
//! - Recording configuration and its defaults

mod capture;
mod clock;
mod config;
mod events;
mod recorder;
mod state;

pub use capture::PAUSE_POLL_INTERVAL;
pub use clock::PauseClock;
pub use config::{
    max_sample_count, AudioEncoder, OutputFormat, RecordingConfig, ResolvedConfig,
    ABSOLUTE_MAX_DURATION_SECS, DEFAULT_FILE_NAME,
};
pub use events::{ProgressUpdate, RecorderEvent, StopSummary};
pub use recorder::{ControlOutcome, GrantedConfig, StartedRecording, StopOutcome, WavRecorder};
pub use state::{RecorderState, StateCell, StopReason, StopReasonCell};
