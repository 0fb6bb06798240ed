//! 65816 processor status register (P).
//!
//! Bits 4 and 5 change meaning with the emulation bit. In native mode they
//! are the index (X) and accumulator (M) width flags. In emulation mode
//! both are held set, and bit 4 shows up as the break flag when P is
//! pushed by BRK.

/// Carry.
pub const C: u8 = 0x01;

/// Zero.
pub const Z: u8 = 0x02;

/// IRQ disable.
pub const I: u8 = 0x04;

/// Decimal mode for ADC/SBC.
pub const D: u8 = 0x08;

/// Index width: set = 8-bit X/Y.
pub const X: u8 = 0x10;

/// Break, the emulation-mode name for bit 4.
pub const B: u8 = 0x10;

/// Accumulator width: set = 8-bit A and memory operands.
pub const M: u8 = 0x20;

/// Overflow.
pub const V: u8 = 0x40;

/// Negative.
pub const N: u8 = 0x80;

/// Processor status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// Set or clear a flag based on condition.
    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// Update N and Z from a value of the given width.
    pub fn update_nz(&mut self, value: u16, wide: bool) {
        if wide {
            self.set_if(N, value & 0x8000 != 0);
            self.set_if(Z, value == 0);
        } else {
            self.set_if(N, value & 0x80 != 0);
            self.set_if(Z, value & 0xFF == 0);
        }
    }
}
