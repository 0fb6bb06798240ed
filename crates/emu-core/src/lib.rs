//! Core traits and types shared by the SNES processors.
//!
//! Every unit is reached through a [`Bus`], timed by a [`Clock`] and
//! inspectable through [`Observable`]. Nothing here knows which console it
//! is driving.

mod bus;
mod clock;
mod cpu;
mod observable;
mod tickable;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::Clock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use tickable::Tickable;
pub use ticks::Ticks;
