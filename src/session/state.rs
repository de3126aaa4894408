use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the recorder
///
/// `Idle → Recording → (Paused ⇄ Recording) → Stopping → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecorderState {
    Idle = 0,
    Recording = 1,
    Paused = 2,
    Stopping = 3,
}

impl RecorderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Recording,
            2 => Self::Paused,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }

    /// Recording or paused: a session is live and may be stopped
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Why a recording ended
///
/// Ordered by precedence: when several apply, the greatest wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StopReason {
    /// Stopped by the caller (or the input ran out)
    Requested = 1,
    /// The configured maximum duration was reached
    MaxDurationReached = 2,
    /// Capture or finalize failed
    Error = 3,
}

impl StopReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Requested),
            2 => Some(Self::MaxDurationReached),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "Requested",
            Self::MaxDurationReached => "MaxDurationReached",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Recorder state shared between the control side and the capture worker
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: RecorderState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> RecorderState {
        RecorderState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move to `to` if the current state is one of `from`. Only one of
    /// several racing callers can win a given transition.
    ///
    /// Returns the state that was replaced, or the current state on failure.
    pub fn transition(
        &self,
        from: &[RecorderState],
        to: RecorderState,
    ) -> Result<RecorderState, RecorderState> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                from.contains(&RecorderState::from_u8(current))
                    .then_some(to as u8)
            })
            .map(RecorderState::from_u8)
            .map_err(RecorderState::from_u8)
    }

    /// Unconditional store; only for the worker's final `Stopping → Idle`
    pub(crate) fn set(&self, state: RecorderState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Stop reason of one session
///
/// Starts unset. Recording a reason keeps the highest-precedence one seen,
/// so exactly one value is read at finalize regardless of arrival order.
#[derive(Debug, Default)]
pub struct StopReasonCell(AtomicU8);

impl StopReasonCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, reason: StopReason) {
        self.0.fetch_max(reason as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> Option<StopReason> {
        StopReason::from_u8(self.0.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RecorderState::*;

    #[test]
    fn test_transition_from_allowed_state() {
        let cell = StateCell::new(Idle);
        assert_eq!(cell.transition(&[Idle], Recording), Ok(Idle));
        assert_eq!(cell.transition(&[Recording], Paused), Ok(Recording));
        assert_eq!(cell.transition(&[Paused], Recording), Ok(Paused));
        assert_eq!(cell.transition(&[Recording, Paused], Stopping), Ok(Recording));
        assert_eq!(cell.load(), Stopping);
    }

    #[test]
    fn test_transition_rejected_reports_current_state() {
        let cell = StateCell::new(Idle);
        assert_eq!(cell.transition(&[Recording], Paused), Err(Idle));
        assert_eq!(cell.transition(&[Recording, Paused], Stopping), Err(Idle));
        assert_eq!(cell.load(), Idle);
    }

    #[test]
    fn test_only_one_stopper_wins() {
        let cell = std::sync::Arc::new(StateCell::new(Recording));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || cell.transition(&[Recording, Paused], Stopping).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_stop_reason_unset_until_recorded() {
        let cell = StopReasonCell::new();
        assert_eq!(cell.get(), None);
        cell.record(StopReason::Requested);
        assert_eq!(cell.get(), Some(StopReason::Requested));
    }

    #[test]
    fn test_max_duration_beats_requested_in_any_order() {
        let cell = StopReasonCell::new();
        cell.record(StopReason::Requested);
        cell.record(StopReason::MaxDurationReached);
        assert_eq!(cell.get(), Some(StopReason::MaxDurationReached));

        let cell = StopReasonCell::new();
        cell.record(StopReason::MaxDurationReached);
        cell.record(StopReason::Requested);
        assert_eq!(cell.get(), Some(StopReason::MaxDurationReached));
    }

    #[test]
    fn test_error_overrides_everything() {
        let cell = StopReasonCell::new();
        cell.record(StopReason::MaxDurationReached);
        cell.record(StopReason::Error);
        cell.record(StopReason::Requested);
        assert_eq!(cell.get(), Some(StopReason::Error));
    }
}
