//! CPU core trait.

use crate::Bus;

/// An instruction-stepped CPU core.
///
/// The bus is passed in rather than owned so the system can route the same
/// bus to other units between steps. Each step executes exactly one
/// instruction (or services one pending interrupt) and reports how many of
/// the CPU's own clock cycles it took.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction. Returns the cycles consumed.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Returns the current program counter, bank included where the CPU has
    /// one.
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU has stopped fetching instructions.
    fn is_halted(&self) -> bool;

    /// Request a maskable interrupt. Returns true if it will be taken on the
    /// next step.
    fn interrupt(&mut self) -> bool;

    /// Request a non-maskable interrupt.
    fn nmi(&mut self);

    /// Put registers back into their power-on state.
    fn reset(&mut self);
}
