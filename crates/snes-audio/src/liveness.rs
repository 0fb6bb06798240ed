//! Stuck-driver detection.
//!
//! The SPC700 never halts on bad code, it just spins. The host samples the
//! APU program counter once per window of emulated time; if the PC has not
//! moved across five consecutive windows the driver is considered dead.

use thiserror::Error;

/// Window length in seconds.
pub const WINDOW_SECONDS: f64 = 1.0;

/// Consecutive unchanged windows that count as a fault.
pub const STUCK_WINDOWS: u32 = 5;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("APU driver stuck at PC=${pc:04X} for {windows} one-second windows")]
pub struct LivenessFault {
    pub pc: u16,
    pub windows: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LivenessMonitor {
    /// Time into the current window.
    elapsed: f64,
    /// PC sampled at the start of the current window.
    window_pc: Option<u16>,
    stuck: u32,
}

impl LivenessMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget history, e.g. after a driver restart.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record `seconds` of emulated time ending with the APU at `pc`.
    pub fn observe(&mut self, pc: u16, seconds: f64) -> Result<(), LivenessFault> {
        let Some(start) = self.window_pc else {
            self.window_pc = Some(pc);
            return Ok(());
        };
        self.elapsed += seconds;
        if self.elapsed < WINDOW_SECONDS {
            return Ok(());
        }
        let windows = (self.elapsed / WINDOW_SECONDS) as u32;
        self.elapsed -= f64::from(windows) * WINDOW_SECONDS;
        self.window_pc = Some(pc);
        if pc == start {
            self.stuck += windows;
        } else {
            self.stuck = 0;
        }
        if self.stuck >= STUCK_WINDOWS {
            return Err(LivenessFault {
                pc,
                windows: self.stuck,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn stuck_windows(&self) -> u32 {
        self.stuck
    }
}
