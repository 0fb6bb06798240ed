//! SPC700 register file.

use crate::flags::{N, P, Z};

/// SPC700 registers.
///
/// Y and A pair up as the 16-bit YA for the word instructions (Y high).
/// The stack lives in page 1: SP is the low byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub psw: u8,
}

impl Registers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xEF,
            pc: 0,
            psw: 0,
        }
    }

    #[must_use]
    pub const fn flag(&self, flag: u8) -> bool {
        self.psw & flag != 0
    }

    pub fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.psw |= flag;
        } else {
            self.psw &= !flag;
        }
    }

    pub fn update_nz(&mut self, value: u8) {
        self.set_flag(N, value & 0x80 != 0);
        self.set_flag(Z, value == 0);
    }

    /// N and Z from a 16-bit result (YA ops).
    pub fn update_nz16(&mut self, value: u16) {
        self.set_flag(N, value & 0x8000 != 0);
        self.set_flag(Z, value == 0);
    }

    #[must_use]
    pub const fn ya(&self) -> u16 {
        ((self.y as u16) << 8) | self.a as u16
    }

    pub fn set_ya(&mut self, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.a = lo;
        self.y = hi;
    }

    /// Base address of the direct page selected by the P flag.
    #[must_use]
    pub const fn direct_page(&self) -> u16 {
        if self.flag(P) { 0x0100 } else { 0x0000 }
    }
}
