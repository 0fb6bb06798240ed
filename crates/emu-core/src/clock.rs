//! Clock domains.

use crate::Ticks;

/// A cycle counter with its own frequency.
///
/// Wall-clock time is fed in with [`Clock::accumulate`]; the owner then
/// drains the debt one period at a time with [`Clock::is_owed`] and
/// [`Clock::consume`]. Each clock keeps its own backlog so one slow domain
/// never holds up another.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    frequency_hz: f64,
    cycles: Ticks,
    accumulated: f64,
}

impl Clock {
    #[must_use]
    pub const fn new(frequency_hz: f64) -> Self {
        Self {
            frequency_hz,
            cycles: Ticks::ZERO,
            accumulated: 0.0,
        }
    }

    pub fn set_frequency(&mut self, frequency_hz: f64) {
        self.frequency_hz = frequency_hz;
    }

    #[must_use]
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    /// Length of one cycle in seconds.
    #[must_use]
    pub fn period(&self) -> f64 {
        1.0 / self.frequency_hz
    }

    /// Total cycles consumed since creation.
    #[must_use]
    pub fn cycles(&self) -> Ticks {
        self.cycles
    }

    /// Seconds of wall time not yet converted into cycles.
    #[must_use]
    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    /// Add elapsed wall time to the backlog.
    pub fn accumulate(&mut self, seconds: f64) {
        self.accumulated += seconds;
    }

    /// True while at least one full period is owed.
    #[must_use]
    pub fn is_owed(&self) -> bool {
        self.accumulated >= self.period()
    }

    /// Pay back `cycles` periods of the backlog.
    pub fn consume(&mut self, cycles: u64) {
        self.accumulated -= self.period() * cycles as f64;
        self.cycles += Ticks::new(cycles);
    }

    /// Whole cycles that fit in `seconds` at this clock's frequency.
    #[must_use]
    pub fn cycles_in(&self, seconds: f64) -> u64 {
        (seconds * self.frequency_hz) as u64
    }

    /// Drop any backlog, keeping the cycle count.
    pub fn clear_backlog(&mut self) {
        self.accumulated = 0.0;
    }
}
