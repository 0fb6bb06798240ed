//! SNES system core.
//!
//! The master crystal runs at 21,477,272 Hz (NTSC) or 21,281,370 Hz (PAL).
//! One scanline is 1364 master cycles, so an NTSC frame is
//! 1364 × 262 = 357,368 master cycles. The 65816 is clocked at crystal/8
//! here, a fixed average of the real 6/8/12 access timings.
//!
//! The APU runs from its own 24.576 MHz crystal. Against the master clock
//! it advances 32,040 × 32 APU cycles for every 1364 × lines × field-rate
//! master cycles, which keeps exactly one field of audio per video frame.
//!
//! Two ways to drive the system:
//! - [`Snes::run`] takes elapsed wall time and drains each clock domain
//!   (CPU, APU, video) independently;
//! - [`Snes::run_frame`] steps deterministically on the master clock, for
//!   tests and headless use.

mod bus;
mod config;
mod error;
pub mod ppu;
mod snes;

pub use bus::SnesBus;
pub use config::{ExperimentFlags, SnesConfig, SnesRegion};
pub use error::SnesError;
pub use ppu::Ppu;
pub use snes::Snes;
