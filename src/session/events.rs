use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::state::StopReason;

/// Periodic progress of a live recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Recording time so far, excluding pauses
    pub elapsed_ms: u64,
    pub is_recording: bool,
    /// Level of the most recent frame in dBFS; absent when metering is off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_db: Option<f64>,
}

/// Outcome of a finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSummary {
    pub destination: PathBuf,
    pub reason: StopReason,
    /// Bytes in the WAV data chunk; zero if finalize failed
    pub data_bytes: u64,
    pub samples_processed: u64,
}

/// Events delivered to the application while a session runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecorderEvent {
    Progress(ProgressUpdate),
    /// Always the last event of a session; the channel closes after it
    Stopped(StopSummary),
}

/// Sending side of a session's event channel
///
/// Progress and the terminal event share one lock so nothing can be sent
/// once the terminal event is out.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<RecorderEvent>>>>,
}

impl EventSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<RecorderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Returns false once the session has ended
    pub(crate) fn progress(&self, update: ProgressUpdate) -> bool {
        let guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(tx) => {
                // A dropped receiver just means nobody is listening
                let _ = tx.send(RecorderEvent::Progress(update));
                true
            }
            None => false,
        }
    }

    /// Send the terminal event and close the channel. Later calls do nothing.
    pub(crate) fn finish(&self, summary: StopSummary) {
        let mut guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = guard.take() {
            let _ = tx.send(RecorderEvent::Stopped(summary));
        }
    }
}
