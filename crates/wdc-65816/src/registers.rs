//! 65816 register file.

use crate::Status;
use crate::flags::{I, M, X};

/// 65816 CPU register set.
///
/// - A: accumulator, 8 or 16 bits per the M flag (high byte is "B" when
///   8-bit)
/// - X, Y: index registers, 8 or 16 bits per the X flag
/// - S: stack pointer, held in page 1 in emulation mode
/// - D: direct page base
/// - DB, PB: data and program bank
/// - PC: 16-bit program counter within PB
/// - P, E: status and the emulation bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub s: u16,
    pub d: u16,
    pub db: u8,
    pub pb: u8,
    pub pc: u16,
    pub p: Status,
    /// Emulation mode. While set, M and X are forced on.
    pub e: bool,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Power-on state: emulation mode, 8-bit everything, IRQs masked,
    /// stack at $01FF.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0x01FF,
            d: 0,
            db: 0,
            pb: 0,
            pc: 0,
            p: Status(M | X | I),
            e: true,
        }
    }

    /// True when A and memory operands are 16-bit.
    #[must_use]
    pub const fn accumulator_is_wide(&self) -> bool {
        !self.e && !self.p.is_set(M)
    }

    /// True when X and Y are 16-bit.
    #[must_use]
    pub const fn index_is_wide(&self) -> bool {
        !self.e && !self.p.is_set(X)
    }

    /// PB:PC as a 24-bit address.
    #[must_use]
    pub const fn pc_long(&self) -> u32 {
        ((self.pb as u32) << 16) | self.pc as u32
    }

    /// Re-establish the invariants that tie P and E to the other registers.
    ///
    /// Called after anything that can change M, X or E.
    pub fn enforce_widths(&mut self) {
        if self.e {
            self.p.set(M | X);
            self.s = 0x0100 | (self.s & 0x00FF);
        }
        if self.p.is_set(X) {
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }
}
