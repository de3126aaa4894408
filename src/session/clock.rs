use std::time::{Duration, Instant};

/// Elapsed recording time, excluding paused intervals
#[derive(Debug, Clone)]
pub struct PauseClock {
    started: Instant,
    paused_at: Option<Instant>,
    total_paused: Duration,
}

impl PauseClock {
    pub fn start_at(now: Instant) -> Self {
        Self {
            started: now,
            paused_at: None,
            total_paused: Duration::ZERO,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn total_paused(&self) -> Duration {
        self.total_paused
    }

    /// Freeze elapsed time. No-op if already paused.
    pub fn pause_at(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Add the interval since `pause_at` to the paused total. No-op if not
    /// paused.
    pub fn resume_at(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused += now.saturating_duration_since(paused_at);
        }
    }

    /// Wall-clock time since start minus all paused time. While paused the
    /// value holds at the pause point.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let end = self.paused_at.unwrap_or(now);
        end.saturating_duration_since(self.started)
            .saturating_sub(self.total_paused)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_elapsed_without_pauses() {
        let t0 = Instant::now();
        let clock = PauseClock::start_at(t0);
        assert_eq!(clock.elapsed_at(t0 + ms(1500)), ms(1500));
    }

    #[test]
    fn test_elapsed_excludes_paused_intervals() {
        let t0 = Instant::now();
        let mut clock = PauseClock::start_at(t0);

        // Record 100, pause 50, record 200, pause 300, record 25
        clock.pause_at(t0 + ms(100));
        clock.resume_at(t0 + ms(150));
        clock.pause_at(t0 + ms(350));
        clock.resume_at(t0 + ms(650));

        assert_eq!(clock.total_paused(), ms(350));
        assert_eq!(clock.elapsed_at(t0 + ms(675)), ms(325));
    }

    #[test]
    fn test_elapsed_frozen_while_paused() {
        let t0 = Instant::now();
        let mut clock = PauseClock::start_at(t0);

        clock.pause_at(t0 + ms(400));
        assert!(clock.is_paused());
        assert_eq!(clock.elapsed_at(t0 + ms(400)), ms(400));
        assert_eq!(clock.elapsed_at(t0 + ms(9000)), ms(400));
    }

    #[test]
    fn test_repeated_pause_and_resume_are_idempotent() {
        let t0 = Instant::now();
        let mut clock = PauseClock::start_at(t0);

        clock.pause_at(t0 + ms(100));
        clock.pause_at(t0 + ms(200));
        clock.resume_at(t0 + ms(300));
        clock.resume_at(t0 + ms(400));

        assert_eq!(clock.total_paused(), ms(200));
        assert_eq!(clock.elapsed_at(t0 + ms(500)), ms(300));
    }

    #[test]
    fn test_many_cycles_sum_paused_time() {
        let t0 = Instant::now();
        let mut clock = PauseClock::start_at(t0);
        let mut now = t0;
        let mut recorded = Duration::ZERO;

        for cycle in 1..=10u64 {
            now += ms(10 * cycle);
            recorded += ms(10 * cycle);
            clock.pause_at(now);
            now += ms(7 * cycle);
            clock.resume_at(now);
        }

        assert_eq!(clock.elapsed_at(now), recorded);
        assert_eq!(clock.elapsed_at(now) + clock.total_paused(), now - t0);
    }
}
