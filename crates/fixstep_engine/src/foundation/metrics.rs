//! Loop rate metrics
//!
//! Counts events (simulation ticks, presented frames) over one-second
//! windows, the way updates-per-second and frames-per-second are reported.

use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(1);

/// Events-per-second counter over fixed one-second windows
#[derive(Debug, Clone, Default)]
pub struct RateCounter {
    window_elapsed: Duration,
    window_count: u64,
    last_rate: u64,
    total: u64,
}

impl RateCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` events
    pub fn record(&mut self, count: u64) {
        self.window_count += count;
        self.total += count;
    }

    /// Advance the window clock; returns the finished window's rate when one closes
    pub fn advance(&mut self, elapsed: Duration) -> Option<u64> {
        self.window_elapsed += elapsed;
        if self.window_elapsed < WINDOW {
            return None;
        }

        self.last_rate = self.window_count;
        self.window_count = 0;
        // Keep the overshoot so windows do not drift
        self.window_elapsed = Duration::from_nanos(
            (self.window_elapsed.as_nanos() % WINDOW.as_nanos()) as u64,
        );
        Some(self.last_rate)
    }

    /// Rate measured over the last complete window
    pub fn rate(&self) -> u64 {
        self.last_rate
    }

    /// Total events ever recorded
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Snapshot of the game loop's health counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMetrics {
    /// Simulation ticks over the last complete second
    pub updates_per_second: u64,
    /// Rendered frames over the last complete second
    pub frames_per_second: u64,
    /// Simulation ticks executed since start
    pub total_ticks: u64,
    /// Frames rendered since start
    pub total_frames: u64,
    /// Driver ticks that hit the catch-up bound
    pub falling_behind_events: u64,
    /// Simulation ticks discarded by the catch-up bound
    pub dropped_ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_reported_after_full_window() {
        let mut counter = RateCounter::new();
        for _ in 0..60 {
            counter.record(1);
            assert!(counter.advance(Duration::from_millis(10)).is_none());
        }
        assert_eq!(counter.total(), 60);

        let mut closed = None;
        for _ in 0..40 {
            counter.record(1);
            if let Some(rate) = counter.advance(Duration::from_millis(10)) {
                closed = Some(rate);
            }
        }
        assert_eq!(closed, Some(100));
        assert_eq!(counter.rate(), 100);
    }

    #[test]
    fn test_window_keeps_overshoot() {
        let mut counter = RateCounter::new();
        counter.record(3);
        assert_eq!(counter.advance(Duration::from_millis(1500)), Some(3));
        counter.record(2);
        assert_eq!(counter.advance(Duration::from_millis(500)), Some(2));
    }
}
