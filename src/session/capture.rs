// Capture worker: the blocking loop that drains the device into the spool
//
// Owns the device handle and the spool for the whole session. The control
// side only flips the shared state; the loop notices at each frame
// boundary and on each pause poll, then finalizes and cleans up itself.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::clock::PauseClock;
use super::events::{EventSink, StopSummary};
use super::state::{RecorderState, StateCell, StopReason, StopReasonCell};
use crate::audio::{
    compute_level_db, CaptureFormat, FrameProcessor, ProcessedFrame, SampleSource, SourceError,
};
use crate::error::{RecorderError, Result};
use crate::wav::SampleSpool;

/// How often a paused loop checks whether to resume or stop
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Session state visible to both the control side and the capture loop
///
/// The control side owns state transitions and pause bookkeeping; the loop
/// owns the sample count and the level.
pub(crate) struct SessionShared {
    pub(crate) state: StateCell,
    pub(crate) reason: StopReasonCell,
    samples_processed: AtomicU64,
    /// f64 bits of the latest level
    level_bits: AtomicU64,
    clock: Mutex<PauseClock>,
}

impl SessionShared {
    pub(crate) fn new(started: Instant) -> Self {
        Self {
            state: StateCell::new(RecorderState::Recording),
            reason: StopReasonCell::new(),
            samples_processed: AtomicU64::new(0),
            level_bits: AtomicU64::new(0.0f64.to_bits()),
            clock: Mutex::new(PauseClock::start_at(started)),
        }
    }

    pub(crate) fn clock(&self) -> MutexGuard<'_, PauseClock> {
        match self.clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.clock().elapsed()
    }

    pub(crate) fn samples_processed(&self) -> u64 {
        self.samples_processed.load(Ordering::SeqCst)
    }

    pub(crate) fn level_db(&self) -> f64 {
        f64::from_bits(self.level_bits.load(Ordering::SeqCst))
    }

    fn set_level_db(&self, level: f64) {
        self.level_bits.store(level.to_bits(), Ordering::SeqCst);
    }
}

pub(crate) struct CaptureJob {
    pub(crate) session_id: Uuid,
    pub(crate) source: Box<dyn SampleSource>,
    pub(crate) spool: SampleSpool,
    pub(crate) processor: FrameProcessor,
    /// Granted format
    pub(crate) format: CaptureFormat,
    pub(crate) destination: PathBuf,
    pub(crate) metering_enabled: bool,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) events: EventSink,
}

impl CaptureJob {
    /// Run the session to completion. Whatever ends it, the device is
    /// released, a finalize is attempted, the spool is deleted, the state
    /// returns to Idle and then the terminal event is sent.
    pub(crate) fn run(self) -> Result<StopSummary> {
        let CaptureJob {
            session_id,
            mut source,
            mut spool,
            mut processor,
            format,
            destination,
            metering_enabled,
            shared,
            events,
        } = self;

        info!("Capture loop started for session {} ({})", session_id, format);

        let captured = capture_frames(
            source.as_mut(),
            &mut spool,
            &mut processor,
            &shared,
            format,
            metering_enabled,
        );
        if let Err(e) = &captured {
            error!("Capture failed for session {}: {}", session_id, e);
            shared.reason.record(StopReason::Error);
        }

        if shared
            .state
            .transition(&[RecorderState::Recording, RecorderState::Paused], RecorderState::Stopping)
            .is_ok()
        {
            info!("Session {} stopping from the capture loop", session_id);
        }

        source.close();

        let finalized = spool.finalize_into(&destination, &format);
        let data_bytes = match &finalized {
            Ok(bytes) => *bytes,
            Err(e) => {
                error!("Failed to write {}: {}", destination.display(), e);
                shared.reason.record(StopReason::Error);
                0
            }
        };

        let summary = StopSummary {
            destination,
            reason: shared.reason.get().unwrap_or(StopReason::Requested),
            data_bytes,
            samples_processed: processor.samples_processed(),
        };

        shared.state.set(RecorderState::Idle);
        events.finish(summary.clone());

        info!(
            "Session {} finished: {} ({} samples, {} data bytes)",
            session_id, summary.reason, summary.samples_processed, summary.data_bytes
        );

        captured?;
        finalized?;
        Ok(summary)
    }
}

fn capture_frames(
    source: &mut dyn SampleSource,
    spool: &mut SampleSpool,
    processor: &mut FrameProcessor,
    shared: &SessionShared,
    format: CaptureFormat,
    metering_enabled: bool,
) -> Result<()> {
    let mut buf = vec![0u8; source.frame_bytes().max(format.block_align())];
    let mut suspended = false;

    loop {
        match shared.state.load() {
            RecorderState::Recording => {
                if suspended {
                    debug!("Resuming capture source '{}'", source.name());
                    source.suspend(false);
                    suspended = false;
                }
            }
            RecorderState::Paused => {
                if !suspended {
                    debug!("Suspending capture source '{}'", source.name());
                    source.suspend(true);
                    suspended = true;
                }
                std::thread::sleep(PAUSE_POLL_INTERVAL);
                continue;
            }
            RecorderState::Stopping | RecorderState::Idle => return Ok(()),
        }

        if processor.is_exhausted() {
            shared.reason.record(StopReason::MaxDurationReached);
            return Ok(());
        }

        let read = match source.read(&mut buf) {
            Ok(read) => read.min(buf.len()),
            Err(SourceError::EndOfStream) => {
                info!("Capture source '{}' reached end of stream", source.name());
                shared.reason.record(StopReason::Requested);
                return Ok(());
            }
            Err(e) => return Err(RecorderError::from(e)),
        };

        match processor.process(&buf[..read]) {
            ProcessedFrame::Skipped => {
                debug!("Skipped {} byte read", read);
            }
            ProcessedFrame::Accepted {
                span,
                samples,
                budget_reached,
            } => {
                spool.append(span)?;
                shared
                    .samples_processed
                    .store(processor.samples_processed(), Ordering::SeqCst);

                if metering_enabled {
                    shared.set_level_db(compute_level_db(
                        span,
                        format.encoding,
                        format.num_channels(),
                    ));
                }

                debug!(
                    "Accepted {} samples ({}/{})",
                    samples,
                    processor.samples_processed(),
                    processor.max_samples()
                );

                if budget_reached {
                    info!("Sample budget of {} reached", processor.max_samples());
                    shared.reason.record(StopReason::MaxDurationReached);
                    return Ok(());
                }
            }
        }
    }
}
