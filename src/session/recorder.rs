use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::capture::{CaptureJob, SessionShared};
use super::config::{max_sample_count, wall_clock_limit, RecordingConfig};
use super::events::{EventSink, ProgressUpdate, RecorderEvent, StopSummary};
use super::state::{RecorderState, StopReason};
use crate::audio::{CaptureFormat, CaptureRequest, DeviceOpener, FrameProcessor, SourceOpener};
use crate::config::RecorderSettings;
use crate::error::{RecorderError, Result};
use crate::wav::SampleSpool;

/// What a started session actually runs with
///
/// `format` is the format the device granted, which may differ from the
/// one requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantedConfig {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub destination: PathBuf,
    pub format: CaptureFormat,
    pub max_duration_ms: u64,
    /// Sample budget derived from the granted rate
    pub max_samples: u64,
    pub metering_enabled: bool,
    pub subscription_duration_ms: u64,
}

/// Result of a successful start
#[derive(Debug)]
pub struct StartedRecording {
    pub granted: GrantedConfig,
    /// Progress events followed by exactly one `Stopped`
    pub events: mpsc::UnboundedReceiver<RecorderEvent>,
}

/// Result of pause or resume; requests that do not apply are not errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Applied,
    Ignored { state: RecorderState },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// This call stopped the session; the file is complete
    Stopped(StopSummary),
    /// Nothing was recording (never started, or it already ended)
    NotRecording,
}

struct ActiveSession {
    id: Uuid,
    shared: Arc<SessionShared>,
    events: EventSink,
    destination: PathBuf,
    worker: JoinHandle<Result<StopSummary>>,
    ticker: JoinHandle<()>,
}

impl ActiveSession {
    /// Wait for the capture worker to finish and tear down the ticker
    async fn finish(self) -> Result<StopSummary> {
        let ActiveSession {
            id,
            shared,
            events,
            destination,
            worker,
            ticker,
        } = self;

        let result = match worker.await {
            Ok(result) => result,
            Err(join_error) => {
                error!("Capture worker for session {} died: {}", id, join_error);
                shared.reason.record(StopReason::Error);
                shared.state.set(RecorderState::Idle);
                events.finish(StopSummary {
                    destination,
                    reason: StopReason::Error,
                    data_bytes: 0,
                    samples_processed: shared.samples_processed(),
                });
                Err(RecorderError::Worker(join_error.to_string()))
            }
        };

        ticker.abort();
        let _ = ticker.await;
        result
    }
}

/// Records raw PCM from a capture device into a WAV file
///
/// At most one session runs at a time. Control calls may come from any
/// task; the capture loop itself runs on a blocking thread.
pub struct WavRecorder {
    opener: Arc<dyn SourceOpener>,
    settings: RecorderSettings,
    subscription_ms: AtomicU64,
    active: Mutex<Option<ActiveSession>>,
    /// Shared state of the newest session, readable without waiting on
    /// `active`
    live: RwLock<Option<Arc<SessionShared>>>,
}

impl WavRecorder {
    pub fn new(opener: Arc<dyn SourceOpener>, settings: RecorderSettings) -> Self {
        let subscription_ms = settings.subscription_duration_ms;
        Self {
            opener,
            settings,
            subscription_ms: AtomicU64::new(subscription_ms),
            active: Mutex::new(None),
            live: RwLock::new(None),
        }
    }

    /// Recorder backed by the built-in device sources
    pub fn with_devices(settings: RecorderSettings) -> Self {
        Self::new(Arc::new(DeviceOpener::default()), settings)
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Progress cadence for sessions started afterwards
    pub fn set_subscription_duration(&self, interval: Duration) {
        let ms = interval.as_millis().min(u64::MAX as u128) as u64;
        self.subscription_ms.store(ms, Ordering::SeqCst);
    }

    pub fn subscription_duration(&self) -> Duration {
        Duration::from_millis(self.subscription_ms.load(Ordering::SeqCst))
    }

    pub fn state(&self) -> RecorderState {
        self.live_session()
            .map(|shared| shared.state.load())
            .unwrap_or(RecorderState::Idle)
    }

    fn live_session(&self) -> Option<Arc<SessionShared>> {
        let guard = match self.live.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }

    fn set_live_session(&self, shared: Option<Arc<SessionShared>>) {
        let mut guard = match self.live.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = shared;
    }

    /// Open the device and begin capturing
    ///
    /// Fails with `InvalidState` unless the recorder is idle. On any failure
    /// the recorder stays idle and nothing is left on disk.
    pub async fn start(&self, config: RecordingConfig) -> Result<StartedRecording> {
        let mut active = self.active.lock().await;

        if let Some(session) = active.as_ref() {
            let state = session.shared.state.load();
            if state != RecorderState::Idle {
                warn!("Recording already in progress ({})", state);
                return Err(RecorderError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }

        // A session that ended on its own is reaped here
        if let Some(finished) = active.take() {
            if let Err(e) = finished.finish().await {
                warn!("Previous recording ended with an error: {}", e);
            }
        }

        let resolved = config.resolve(&self.settings, self.subscription_duration())?;
        let request = CaptureRequest {
            format: resolved.format,
            device: resolved.device.clone(),
            buffer_duration_ms: resolved.buffer_duration_ms,
        };

        info!(
            "Starting recording to {} ({}, max {:.1}s)",
            resolved.destination.display(),
            request.format,
            resolved.max_duration.as_secs_f64()
        );

        let opener = Arc::clone(&self.opener);
        let mut source = tokio::task::spawn_blocking(move || opener.open(&request))
            .await
            .map_err(|e| RecorderError::Worker(e.to_string()))??;

        let format = source.granted();
        if format != resolved.format {
            warn!(
                "Device granted {} instead of requested {}",
                format, resolved.format
            );
        }
        let max_samples = max_sample_count(format.sample_rate, resolved.max_duration);
        let wall_limit = wall_clock_limit(resolved.max_duration, format, source.frame_bytes());

        let session_id = Uuid::new_v4();
        let spool_path = self
            .settings
            .scratch_dir()
            .join(format!("wavrec-{}.lpcm", session_id));
        let spool = match SampleSpool::create(&spool_path) {
            Ok(spool) => spool,
            Err(e) => {
                source.close();
                return Err(e.into());
            }
        };

        let shared = Arc::new(SessionShared::new(Instant::now()));
        let (events, receiver) = EventSink::channel();

        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&shared),
            events.clone(),
            resolved.subscription_duration,
            wall_limit,
            resolved.metering_enabled,
        ));

        let job = CaptureJob {
            session_id,
            source,
            spool,
            processor: FrameProcessor::new(format.block_align(), max_samples),
            format,
            destination: resolved.destination.clone(),
            metering_enabled: resolved.metering_enabled,
            shared: Arc::clone(&shared),
            events: events.clone(),
        };
        let worker = tokio::task::spawn_blocking(move || job.run());

        self.set_live_session(Some(Arc::clone(&shared)));
        *active = Some(ActiveSession {
            id: session_id,
            shared,
            events,
            destination: resolved.destination.clone(),
            worker,
            ticker,
        });

        info!("Recording session {} started", session_id);

        Ok(StartedRecording {
            granted: GrantedConfig {
                session_id,
                started_at: Utc::now(),
                destination: resolved.destination,
                format,
                max_duration_ms: resolved.max_duration.as_millis() as u64,
                max_samples,
                metering_enabled: resolved.metering_enabled,
                subscription_duration_ms: resolved.subscription_duration.as_millis() as u64,
            },
            events: receiver,
        })
    }

    /// Suspend capture; elapsed time stops advancing until resumed
    pub fn pause(&self) -> ControlOutcome {
        let Some(shared) = self.live_session() else {
            return ControlOutcome::Ignored {
                state: RecorderState::Idle,
            };
        };

        let mut clock = shared.clock();
        match shared
            .state
            .transition(&[RecorderState::Recording], RecorderState::Paused)
        {
            Ok(_) => {
                clock.pause_at(Instant::now());
                info!("Recording paused");
                ControlOutcome::Applied
            }
            Err(state) => {
                info!("Pause ignored while {}", state);
                ControlOutcome::Ignored { state }
            }
        }
    }

    pub fn resume(&self) -> ControlOutcome {
        let Some(shared) = self.live_session() else {
            return ControlOutcome::Ignored {
                state: RecorderState::Idle,
            };
        };

        let mut clock = shared.clock();
        match shared
            .state
            .transition(&[RecorderState::Paused], RecorderState::Recording)
        {
            Ok(_) => {
                clock.resume_at(Instant::now());
                info!("Recording resumed");
                ControlOutcome::Applied
            }
            Err(state) => {
                info!("Resume ignored while {}", state);
                ControlOutcome::Ignored { state }
            }
        }
    }

    /// Stop the session and wait for the file to be finalized
    ///
    /// Returns `NotRecording` when there is nothing to stop, including when
    /// the session already ended by itself. Calling it again is harmless.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let mut active = self.active.lock().await;

        let Some(session) = active.take() else {
            info!("Stop requested but nothing is recording");
            return Ok(StopOutcome::NotRecording);
        };

        let claimed = session.shared.state.transition(
            &[RecorderState::Recording, RecorderState::Paused],
            RecorderState::Stopping,
        );
        match claimed {
            Ok(previous) => {
                session.shared.reason.record(StopReason::Requested);
                info!("Stopping recording session {} (was {})", session.id, previous);
            }
            Err(state) => {
                info!("Session {} already {}; waiting for it to end", session.id, state);
            }
        }

        let result = session.finish().await;

        match claimed {
            Ok(_) => result.map(StopOutcome::Stopped),
            Err(_) => {
                if let Err(e) = result {
                    warn!("Recording ended with an error: {}", e);
                }
                Ok(StopOutcome::NotRecording)
            }
        }
    }
}

impl Drop for WavRecorder {
    fn drop(&mut self) {
        // Let a running worker finalize and clean up on its own
        if let Some(shared) = self.live_session() {
            if shared
                .state
                .transition(
                    &[RecorderState::Recording, RecorderState::Paused],
                    RecorderState::Stopping,
                )
                .is_ok()
            {
                shared.reason.record(StopReason::Requested);
            }
        }
    }
}

/// Emit progress every `period` until the session leaves Recording/Paused.
/// Also stops a device that delivers too slowly to fill its sample budget
/// within `wall_limit` of unpaused time.
async fn run_ticker(
    shared: Arc<SessionShared>,
    events: EventSink,
    period: Duration,
    wall_limit: Duration,
    metering_enabled: bool,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match shared.state.load() {
            RecorderState::Recording => {}
            RecorderState::Paused => continue,
            RecorderState::Stopping | RecorderState::Idle => break,
        }

        let elapsed = shared.elapsed();
        if elapsed > wall_limit {
            info!(
                "Wall-clock limit of {:.2}s elapsed with {} samples captured",
                wall_limit.as_secs_f64(),
                shared.samples_processed()
            );
            shared.reason.record(StopReason::MaxDurationReached);
            let _ = shared.state.transition(
                &[RecorderState::Recording, RecorderState::Paused],
                RecorderState::Stopping,
            );
            break;
        }

        let update = ProgressUpdate {
            elapsed_ms: elapsed.as_millis() as u64,
            is_recording: true,
            level_db: metering_enabled.then(|| shared.level_db()),
        };
        if !events.progress(update) {
            break;
        }
    }
}
