//! Operand fetch, stack access and addressing-mode resolution.
//!
//! Every resolver returns a 24-bit effective address and leaves PC just
//! past the operand bytes it consumed. Reading or writing the data at that
//! address is the instruction's job, because only the instruction knows
//! whether it wants 8 or 16 bits.
//!
//! Wrap rules:
//! - direct page and stack-relative addresses wrap inside bank 0;
//! - absolute-indexed addresses wrap inside the data bank (no carry into
//!   the bank byte);
//! - long and indirect-indexed addresses wrap at 24 bits.

use emu_core::Bus;

use crate::Wdc65816;

/// 65816 addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `#imm`, 8 or 16 bits per the M flag.
    ImmediateM,
    /// `#imm`, 8 or 16 bits per the X flag.
    ImmediateX,
    /// `#imm`, always one byte (REP, SEP, BRK/COP signature).
    Immediate8,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteLong,
    AbsoluteLongX,
    /// `(abs)`, jumps only.
    AbsoluteIndirect,
    /// `(abs,X)`, jumps only.
    AbsoluteIndexedIndirect,
    /// `[abs]`, JML only.
    AbsoluteIndirectLong,
    Direct,
    DirectX,
    DirectY,
    DirectIndirect,
    DirectIndirectLong,
    DirectIndexedIndirect,
    DirectIndirectIndexedY,
    DirectIndirectLongIndexedY,
    StackRelative,
    StackRelativeIndirectIndexedY,
}

impl Mode {
    /// Modes whose data bytes live in bank 0 and wrap at $FFFF.
    #[must_use]
    pub const fn wraps_in_bank_zero(self) -> bool {
        matches!(
            self,
            Mode::Direct | Mode::DirectX | Mode::DirectY | Mode::StackRelative
        )
    }
}

impl Wdc65816 {
    // ------------------------------------------------------------------
    // Operand fetch
    // ------------------------------------------------------------------

    pub(crate) fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc_long());
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    pub(crate) fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn fetch24<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let lo = u32::from(self.fetch16(bus));
        let bank = u32::from(self.fetch8(bus));
        (bank << 16) | lo
    }

    // ------------------------------------------------------------------
    // Stack
    // ------------------------------------------------------------------

    pub(crate) fn push8<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(u32::from(self.regs.s), value);
        self.regs.s = if self.regs.e {
            0x0100 | (self.regs.s.wrapping_sub(1) & 0x00FF)
        } else {
            self.regs.s.wrapping_sub(1)
        };
    }

    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push8(bus, hi);
        self.push8(bus, lo);
    }

    pub(crate) fn pull8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.regs.s = if self.regs.e {
            0x0100 | (self.regs.s.wrapping_add(1) & 0x00FF)
        } else {
            self.regs.s.wrapping_add(1)
        };
        bus.read(u32::from(self.regs.s))
    }

    pub(crate) fn pull16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull8(bus);
        let hi = self.pull8(bus);
        u16::from_le_bytes([lo, hi])
    }

    // ------------------------------------------------------------------
    // Data access at a resolved address
    // ------------------------------------------------------------------

    /// Address of the byte after `addr` for an operand fetched with `mode`.
    fn next_data_address(mode: Mode, addr: u32) -> u32 {
        if mode.wraps_in_bank_zero() {
            addr.wrapping_add(1) & 0xFFFF
        } else {
            addr.wrapping_add(1) & 0x00FF_FFFF
        }
    }

    pub(crate) fn read_data<B: Bus>(&mut self, bus: &mut B, mode: Mode, addr: u32, wide: bool) -> u16 {
        let lo = bus.read(addr);
        if !wide {
            return u16::from(lo);
        }
        self.extra_cycles += 1;
        let hi = bus.read(Self::next_data_address(mode, addr));
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn write_data<B: Bus>(
        &mut self,
        bus: &mut B,
        mode: Mode,
        addr: u32,
        value: u16,
        wide: bool,
    ) {
        let [lo, hi] = value.to_le_bytes();
        bus.write(addr, lo);
        if wide {
            self.extra_cycles += 1;
            bus.write(Self::next_data_address(mode, addr), hi);
        }
    }

    /// Read a pointer stored in bank 0, wrapping at $FFFF.
    fn read_bank0_word<B: Bus>(bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(u32::from(addr));
        let hi = bus.read(u32::from(addr.wrapping_add(1)));
        u16::from_le_bytes([lo, hi])
    }

    fn read_bank0_long<B: Bus>(bus: &mut B, addr: u16) -> u32 {
        let word = u32::from(Self::read_bank0_word(bus, addr));
        let bank = u32::from(bus.read(u32::from(addr.wrapping_add(2))));
        (bank << 16) | word
    }

    fn data_bank(&self) -> u32 {
        u32::from(self.regs.db) << 16
    }

    fn program_bank(&self) -> u32 {
        u32::from(self.regs.pb) << 16
    }

    /// D + offset inside bank 0. A non-zero low byte of D costs a cycle.
    fn direct_address(&mut self, offset: u16) -> u16 {
        if self.regs.d & 0x00FF != 0 {
            self.extra_cycles += 1;
        }
        self.regs.d.wrapping_add(offset)
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve `mode` into a 24-bit effective address, consuming its operand
    /// bytes from the instruction stream.
    pub fn effective_address<B: Bus>(&mut self, bus: &mut B, mode: Mode) -> u32 {
        match mode {
            Mode::ImmediateM | Mode::ImmediateX | Mode::Immediate8 => {
                let wide = match mode {
                    Mode::ImmediateM => self.regs.accumulator_is_wide(),
                    Mode::ImmediateX => self.regs.index_is_wide(),
                    _ => false,
                };
                let addr = self.regs.pc_long();
                self.regs.pc = self.regs.pc.wrapping_add(if wide { 2 } else { 1 });
                addr
            }
            Mode::Absolute => {
                let operand = self.fetch16(bus);
                self.data_bank() | u32::from(operand)
            }
            Mode::AbsoluteX => {
                let operand = self.fetch16(bus);
                self.data_bank() | u32::from(operand.wrapping_add(self.regs.x))
            }
            Mode::AbsoluteY => {
                let operand = self.fetch16(bus);
                self.data_bank() | u32::from(operand.wrapping_add(self.regs.y))
            }
            Mode::AbsoluteLong => self.fetch24(bus),
            Mode::AbsoluteLongX => {
                let operand = self.fetch24(bus);
                operand.wrapping_add(u32::from(self.regs.x)) & 0x00FF_FFFF
            }
            Mode::AbsoluteIndirect => {
                let pointer = self.fetch16(bus);
                self.program_bank() | u32::from(Self::read_bank0_word(bus, pointer))
            }
            Mode::AbsoluteIndexedIndirect => {
                let pointer = self.fetch16(bus).wrapping_add(self.regs.x);
                let bank = self.program_bank();
                let lo = bus.read(bank | u32::from(pointer));
                let hi = bus.read(bank | u32::from(pointer.wrapping_add(1)));
                bank | u32::from(u16::from_le_bytes([lo, hi]))
            }
            Mode::AbsoluteIndirectLong => {
                let pointer = self.fetch16(bus);
                Self::read_bank0_long(bus, pointer)
            }
            Mode::Direct => {
                let offset = u16::from(self.fetch8(bus));
                u32::from(self.direct_address(offset))
            }
            Mode::DirectX => {
                let offset = u16::from(self.fetch8(bus)).wrapping_add(self.regs.x);
                u32::from(self.direct_address(offset))
            }
            Mode::DirectY => {
                let offset = u16::from(self.fetch8(bus)).wrapping_add(self.regs.y);
                u32::from(self.direct_address(offset))
            }
            Mode::DirectIndirect => {
                let offset = u16::from(self.fetch8(bus));
                let pointer = self.direct_address(offset);
                self.data_bank() | u32::from(Self::read_bank0_word(bus, pointer))
            }
            Mode::DirectIndirectLong => {
                let offset = u16::from(self.fetch8(bus));
                let pointer = self.direct_address(offset);
                Self::read_bank0_long(bus, pointer)
            }
            Mode::DirectIndexedIndirect => {
                let offset = u16::from(self.fetch8(bus)).wrapping_add(self.regs.x);
                let pointer = self.direct_address(offset);
                self.data_bank() | u32::from(Self::read_bank0_word(bus, pointer))
            }
            Mode::DirectIndirectIndexedY => {
                let offset = u16::from(self.fetch8(bus));
                let pointer = self.direct_address(offset);
                let base = self.data_bank() | u32::from(Self::read_bank0_word(bus, pointer));
                base.wrapping_add(u32::from(self.regs.y)) & 0x00FF_FFFF
            }
            Mode::DirectIndirectLongIndexedY => {
                let offset = u16::from(self.fetch8(bus));
                let pointer = self.direct_address(offset);
                let base = Self::read_bank0_long(bus, pointer);
                base.wrapping_add(u32::from(self.regs.y)) & 0x00FF_FFFF
            }
            Mode::StackRelative => {
                let offset = u16::from(self.fetch8(bus));
                u32::from(self.regs.s.wrapping_add(offset))
            }
            Mode::StackRelativeIndirectIndexedY => {
                let offset = u16::from(self.fetch8(bus));
                let pointer = self.regs.s.wrapping_add(offset);
                let base = self.data_bank() | u32::from(Self::read_bank0_word(bus, pointer));
                base.wrapping_add(u32::from(self.regs.y)) & 0x00FF_FFFF
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    #[test]
    fn absolute_indexed_stays_in_data_bank() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        cpu.regs.db = 0x12;
        cpu.regs.x = 0x20;
        bus.load(0x0000, &[0xF0, 0xFF]);
        assert_eq!(cpu.effective_address(&mut bus, Mode::AbsoluteX), 0x12_0010);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn indirect_long_indexed_carries_into_bank() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        cpu.regs.y = 0x10;
        bus.load(0x0000, &[0x40]);
        bus.load(0x0040, &[0xF8, 0xFF, 0x7E]);
        assert_eq!(
            cpu.effective_address(&mut bus, Mode::DirectIndirectLongIndexedY),
            0x7F_0008
        );
    }

    #[test]
    fn immediate_width_follows_flags() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        cpu.regs.e = false;
        cpu.regs.p.clear(crate::flags::M);
        assert_eq!(cpu.effective_address(&mut bus, Mode::ImmediateM), 0);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.effective_address(&mut bus, Mode::ImmediateX), 2);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn stack_relative_reads_bank_zero() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        cpu.regs.e = false;
        cpu.regs.s = 0xFFFE;
        cpu.regs.db = 0x7E;
        bus.load(0x0000, &[0x04]);
        assert_eq!(cpu.effective_address(&mut bus, Mode::StackRelative), 0x0002);
    }
}
