//! Time management utilities
//!
//! The game loop never reads the wall clock directly. It goes through a
//! [`TimeSource`], which samples a [`Clock`] once per driver tick and hands
//! out clamped, monotonic deltas.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Monotonic clock backing a [`TimeSource`]
///
/// `now` returns the time elapsed since an arbitrary fixed origin, or `None`
/// when the underlying clock cannot be read.
pub trait Clock: Send {
    /// Current reading of the clock
    fn now(&mut self) -> Option<Duration>;
}

/// Clock backed by [`std::time::Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is the moment of construction
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Option<Duration> {
        Some(self.origin.elapsed())
    }
}

/// Manually advanced clock
///
/// Clones share the same reading, so a test (or a replay driver) can keep one
/// handle while the game loop owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    reading: Arc<Mutex<Option<Duration>>>,
}

impl ManualClock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self {
            reading: Arc::new(Mutex::new(Some(Duration::ZERO))),
        }
    }

    /// Create a clock that reports itself as unavailable
    pub fn unavailable() -> Self {
        Self {
            reading: Arc::new(Mutex::new(None)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut reading = self.reading.lock().unwrap_or_else(PoisonError::into_inner);
        *reading = Some(reading.unwrap_or_default() + by);
    }

    /// Move the clock forward by a number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Option<Duration> {
        *self.reading.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Time source errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// The clock could not be read when the time source was created
    #[error("Clock unavailable: the engine cannot start without a monotonic time source")]
    ClockUnavailable,
}

/// Sampling wrapper around a [`Clock`]
///
/// Every call to [`TimeSource::sample`] returns the time since the previous
/// sample, clamped to `max_elapsed` so a stall (debugger breakpoint, window
/// drag) cannot feed an enormous burst into the simulation.
pub struct TimeSource {
    clock: Box<dyn Clock>,
    last_sample: Duration,
    max_elapsed: Duration,
    total_elapsed: Duration,
    sample_count: u64,
    clamped_count: u64,
}

impl TimeSource {
    /// Create a time source, failing if the clock cannot be read
    pub fn new(mut clock: Box<dyn Clock>, max_elapsed: Duration) -> Result<Self, TimeError> {
        let last_sample = clock.now().ok_or(TimeError::ClockUnavailable)?;
        Ok(Self {
            clock,
            last_sample,
            max_elapsed,
            total_elapsed: Duration::ZERO,
            sample_count: 0,
            clamped_count: 0,
        })
    }

    /// Elapsed time since the previous sample, clamped to the configured maximum
    pub fn sample(&mut self) -> Duration {
        let Some(now) = self.clock.now() else {
            log::warn!("Clock read failed mid-run; reporting zero elapsed time");
            return Duration::ZERO;
        };

        // A clock that steps backwards yields zero rather than a negative delta
        let raw = now.saturating_sub(self.last_sample);
        self.last_sample = self.last_sample.max(now);
        self.sample_count += 1;

        let elapsed = if raw > self.max_elapsed {
            self.clamped_count += 1;
            log::debug!(
                "Clamped elapsed time from {:?} to {:?}",
                raw,
                self.max_elapsed
            );
            self.max_elapsed
        } else {
            raw
        };

        self.total_elapsed += elapsed;
        elapsed
    }

    /// Upper bound applied to each sample
    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    /// Sum of all (clamped) samples handed out so far
    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    /// Number of samples taken
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Number of samples that hit the clamp
    pub fn clamped_count(&self) -> u64 {
        self.clamped_count
    }
}

impl std::fmt::Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSource")
            .field("last_sample", &self.last_sample)
            .field("max_elapsed", &self.max_elapsed)
            .field("total_elapsed", &self.total_elapsed)
            .field("sample_count", &self.sample_count)
            .finish_non_exhaustive()
    }
}

/// Sleeps away whatever is left of a fixed per-frame budget
#[derive(Debug)]
pub struct FramePacer {
    budget: Duration,
    frame_start: Instant,
}

impl FramePacer {
    /// Pace frames to `budget` each
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            frame_start: Instant::now(),
        }
    }

    /// Mark the start of a frame
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Budget left in the current frame
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.frame_start.elapsed())
    }

    /// Sleep until the current frame's budget is spent
    pub fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(clock: &ManualClock, max_ms: u64) -> TimeSource {
        TimeSource::new(Box::new(clock.clone()), Duration::from_millis(max_ms)).unwrap()
    }

    #[test]
    fn test_sample_returns_delta_since_previous_sample() {
        let clock = ManualClock::new();
        let mut time = source(&clock, 250);

        clock.advance_ms(10);
        assert_eq!(time.sample(), Duration::from_millis(10));

        clock.advance_ms(7);
        assert_eq!(time.sample(), Duration::from_millis(7));

        assert_eq!(time.sample(), Duration::ZERO);
        assert_eq!(time.sample_count(), 3);
        assert_eq!(time.total_elapsed(), Duration::from_millis(17));
    }

    #[test]
    fn test_sample_is_clamped() {
        let clock = ManualClock::new();
        let mut time = source(&clock, 100);

        clock.advance(Duration::from_secs(30));
        assert_eq!(time.sample(), Duration::from_millis(100));
        assert_eq!(time.clamped_count(), 1);

        // The stall is consumed, not carried over
        clock.advance_ms(5);
        assert_eq!(time.sample(), Duration::from_millis(5));
    }

    #[test]
    fn test_unavailable_clock_is_fatal() {
        let result = TimeSource::new(Box::new(ManualClock::unavailable()), Duration::from_millis(100));
        assert_eq!(result.unwrap_err(), TimeError::ClockUnavailable);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let a = clock.now().unwrap();
        let b = clock.now().unwrap();
        assert!(b >= a);
    }

    #[test]
    fn test_frame_pacer_waits_out_the_budget() {
        let budget = Duration::from_millis(5);
        let mut pacer = FramePacer::new(budget);
        pacer.begin_frame();
        assert!(pacer.remaining() <= budget);

        pacer.wait();
        assert_eq!(pacer.remaining(), Duration::ZERO);

        // An overrun frame never sleeps
        let pacer = FramePacer::new(Duration::ZERO);
        assert_eq!(pacer.remaining(), Duration::ZERO);
    }
}
