//! SPC700 program status word (PSW) bits.

/// Carry.
pub const C: u8 = 0x01;

/// Zero.
pub const Z: u8 = 0x02;

/// Interrupt enable. Nothing on the APU raises interrupts, but EI/DI and
/// BRK still move it.
pub const I: u8 = 0x04;

/// Half carry, out of bit 3 (bit 11 for word ops).
pub const H: u8 = 0x08;

/// Break.
pub const B: u8 = 0x10;

/// Direct page select: clear = $00xx, set = $01xx.
pub const P: u8 = 0x20;

/// Overflow.
pub const V: u8 = 0x40;

/// Negative.
pub const N: u8 = 0x80;
