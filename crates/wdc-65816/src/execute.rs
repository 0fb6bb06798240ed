//! Opcode dispatch.
//!
//! One arm per opcode. Opcodes that share a mnemonic differ only in the
//! addressing mode they hand to the shared helpers, which is what sets
//! their operand width and how far PC advances.

use emu_core::Bus;

use crate::flags::{C, D, I, N, V, Z};
use crate::{Interrupt, Mode, State, Wdc65816};

/// Base cycle counts with 8-bit registers and an aligned direct page.
#[rustfmt::skip]
const BASE_CYCLES: [u8; 256] = [
    7, 6, 7, 4, 5, 3, 5, 6, 3, 2, 2, 4, 6, 4, 6, 5,
    2, 5, 5, 7, 5, 4, 6, 6, 2, 4, 2, 2, 6, 4, 7, 5,
    6, 6, 8, 4, 3, 3, 5, 6, 4, 2, 2, 5, 4, 4, 6, 5,
    2, 5, 5, 7, 4, 4, 6, 6, 2, 4, 2, 2, 4, 4, 7, 5,
    6, 6, 2, 4, 7, 3, 5, 6, 3, 2, 2, 3, 3, 4, 6, 5,
    2, 5, 5, 7, 7, 4, 6, 6, 2, 4, 3, 2, 4, 4, 7, 5,
    6, 6, 6, 4, 3, 3, 5, 6, 4, 2, 2, 6, 5, 4, 6, 5,
    2, 5, 5, 7, 4, 4, 6, 6, 2, 4, 4, 2, 6, 4, 7, 5,
    3, 6, 4, 4, 3, 3, 3, 6, 2, 2, 2, 3, 4, 4, 4, 5,
    2, 6, 5, 7, 4, 4, 4, 6, 2, 5, 2, 2, 4, 5, 5, 5,
    2, 6, 2, 4, 3, 3, 3, 6, 2, 2, 2, 4, 4, 4, 4, 5,
    2, 5, 5, 7, 4, 4, 4, 6, 2, 4, 2, 2, 4, 4, 4, 5,
    2, 6, 3, 4, 3, 3, 5, 6, 2, 2, 2, 3, 4, 4, 6, 5,
    2, 5, 5, 7, 6, 4, 6, 6, 2, 4, 3, 3, 6, 4, 7, 5,
    2, 6, 3, 4, 3, 3, 5, 6, 2, 2, 2, 3, 4, 4, 6, 5,
    2, 5, 5, 7, 5, 4, 6, 6, 2, 4, 4, 2, 8, 4, 7, 5,
];

impl Wdc65816 {
    pub(crate) fn execute<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u32 {
        match opcode {
            // ORA
            0x01 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::ora),
            0x03 => self.read_a(bus, Mode::StackRelative, Self::ora),
            0x05 => self.read_a(bus, Mode::Direct, Self::ora),
            0x07 => self.read_a(bus, Mode::DirectIndirectLong, Self::ora),
            0x09 => self.read_a(bus, Mode::ImmediateM, Self::ora),
            0x0D => self.read_a(bus, Mode::Absolute, Self::ora),
            0x0F => self.read_a(bus, Mode::AbsoluteLong, Self::ora),
            0x11 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::ora),
            0x12 => self.read_a(bus, Mode::DirectIndirect, Self::ora),
            0x13 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::ora),
            0x15 => self.read_a(bus, Mode::DirectX, Self::ora),
            0x17 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::ora),
            0x19 => self.read_a(bus, Mode::AbsoluteY, Self::ora),
            0x1D => self.read_a(bus, Mode::AbsoluteX, Self::ora),
            0x1F => self.read_a(bus, Mode::AbsoluteLongX, Self::ora),

            // AND
            0x21 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::and),
            0x23 => self.read_a(bus, Mode::StackRelative, Self::and),
            0x25 => self.read_a(bus, Mode::Direct, Self::and),
            0x27 => self.read_a(bus, Mode::DirectIndirectLong, Self::and),
            0x29 => self.read_a(bus, Mode::ImmediateM, Self::and),
            0x2D => self.read_a(bus, Mode::Absolute, Self::and),
            0x2F => self.read_a(bus, Mode::AbsoluteLong, Self::and),
            0x31 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::and),
            0x32 => self.read_a(bus, Mode::DirectIndirect, Self::and),
            0x33 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::and),
            0x35 => self.read_a(bus, Mode::DirectX, Self::and),
            0x37 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::and),
            0x39 => self.read_a(bus, Mode::AbsoluteY, Self::and),
            0x3D => self.read_a(bus, Mode::AbsoluteX, Self::and),
            0x3F => self.read_a(bus, Mode::AbsoluteLongX, Self::and),

            // EOR
            0x41 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::eor),
            0x43 => self.read_a(bus, Mode::StackRelative, Self::eor),
            0x45 => self.read_a(bus, Mode::Direct, Self::eor),
            0x47 => self.read_a(bus, Mode::DirectIndirectLong, Self::eor),
            0x49 => self.read_a(bus, Mode::ImmediateM, Self::eor),
            0x4D => self.read_a(bus, Mode::Absolute, Self::eor),
            0x4F => self.read_a(bus, Mode::AbsoluteLong, Self::eor),
            0x51 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::eor),
            0x52 => self.read_a(bus, Mode::DirectIndirect, Self::eor),
            0x53 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::eor),
            0x55 => self.read_a(bus, Mode::DirectX, Self::eor),
            0x57 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::eor),
            0x59 => self.read_a(bus, Mode::AbsoluteY, Self::eor),
            0x5D => self.read_a(bus, Mode::AbsoluteX, Self::eor),
            0x5F => self.read_a(bus, Mode::AbsoluteLongX, Self::eor),

            // ADC
            0x61 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::adc),
            0x63 => self.read_a(bus, Mode::StackRelative, Self::adc),
            0x65 => self.read_a(bus, Mode::Direct, Self::adc),
            0x67 => self.read_a(bus, Mode::DirectIndirectLong, Self::adc),
            0x69 => self.read_a(bus, Mode::ImmediateM, Self::adc),
            0x6D => self.read_a(bus, Mode::Absolute, Self::adc),
            0x6F => self.read_a(bus, Mode::AbsoluteLong, Self::adc),
            0x71 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::adc),
            0x72 => self.read_a(bus, Mode::DirectIndirect, Self::adc),
            0x73 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::adc),
            0x75 => self.read_a(bus, Mode::DirectX, Self::adc),
            0x77 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::adc),
            0x79 => self.read_a(bus, Mode::AbsoluteY, Self::adc),
            0x7D => self.read_a(bus, Mode::AbsoluteX, Self::adc),
            0x7F => self.read_a(bus, Mode::AbsoluteLongX, Self::adc),

            // STA
            0x81 => self.store_a(bus, Mode::DirectIndexedIndirect),
            0x83 => self.store_a(bus, Mode::StackRelative),
            0x85 => self.store_a(bus, Mode::Direct),
            0x87 => self.store_a(bus, Mode::DirectIndirectLong),
            0x8D => self.store_a(bus, Mode::Absolute),
            0x8F => self.store_a(bus, Mode::AbsoluteLong),
            0x91 => self.store_a(bus, Mode::DirectIndirectIndexedY),
            0x92 => self.store_a(bus, Mode::DirectIndirect),
            0x93 => self.store_a(bus, Mode::StackRelativeIndirectIndexedY),
            0x95 => self.store_a(bus, Mode::DirectX),
            0x97 => self.store_a(bus, Mode::DirectIndirectLongIndexedY),
            0x99 => self.store_a(bus, Mode::AbsoluteY),
            0x9D => self.store_a(bus, Mode::AbsoluteX),
            0x9F => self.store_a(bus, Mode::AbsoluteLongX),

            // LDA
            0xA1 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::lda),
            0xA3 => self.read_a(bus, Mode::StackRelative, Self::lda),
            0xA5 => self.read_a(bus, Mode::Direct, Self::lda),
            0xA7 => self.read_a(bus, Mode::DirectIndirectLong, Self::lda),
            0xA9 => self.read_a(bus, Mode::ImmediateM, Self::lda),
            0xAD => self.read_a(bus, Mode::Absolute, Self::lda),
            0xAF => self.read_a(bus, Mode::AbsoluteLong, Self::lda),
            0xB1 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::lda),
            0xB2 => self.read_a(bus, Mode::DirectIndirect, Self::lda),
            0xB3 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::lda),
            0xB5 => self.read_a(bus, Mode::DirectX, Self::lda),
            0xB7 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::lda),
            0xB9 => self.read_a(bus, Mode::AbsoluteY, Self::lda),
            0xBD => self.read_a(bus, Mode::AbsoluteX, Self::lda),
            0xBF => self.read_a(bus, Mode::AbsoluteLongX, Self::lda),

            // CMP
            0xC1 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::cmp),
            0xC3 => self.read_a(bus, Mode::StackRelative, Self::cmp),
            0xC5 => self.read_a(bus, Mode::Direct, Self::cmp),
            0xC7 => self.read_a(bus, Mode::DirectIndirectLong, Self::cmp),
            0xC9 => self.read_a(bus, Mode::ImmediateM, Self::cmp),
            0xCD => self.read_a(bus, Mode::Absolute, Self::cmp),
            0xCF => self.read_a(bus, Mode::AbsoluteLong, Self::cmp),
            0xD1 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::cmp),
            0xD2 => self.read_a(bus, Mode::DirectIndirect, Self::cmp),
            0xD3 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::cmp),
            0xD5 => self.read_a(bus, Mode::DirectX, Self::cmp),
            0xD7 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::cmp),
            0xD9 => self.read_a(bus, Mode::AbsoluteY, Self::cmp),
            0xDD => self.read_a(bus, Mode::AbsoluteX, Self::cmp),
            0xDF => self.read_a(bus, Mode::AbsoluteLongX, Self::cmp),

            // SBC
            0xE1 => self.read_a(bus, Mode::DirectIndexedIndirect, Self::sbc),
            0xE3 => self.read_a(bus, Mode::StackRelative, Self::sbc),
            0xE5 => self.read_a(bus, Mode::Direct, Self::sbc),
            0xE7 => self.read_a(bus, Mode::DirectIndirectLong, Self::sbc),
            0xE9 => self.read_a(bus, Mode::ImmediateM, Self::sbc),
            0xED => self.read_a(bus, Mode::Absolute, Self::sbc),
            0xEF => self.read_a(bus, Mode::AbsoluteLong, Self::sbc),
            0xF1 => self.read_a(bus, Mode::DirectIndirectIndexedY, Self::sbc),
            0xF2 => self.read_a(bus, Mode::DirectIndirect, Self::sbc),
            0xF3 => self.read_a(bus, Mode::StackRelativeIndirectIndexedY, Self::sbc),
            0xF5 => self.read_a(bus, Mode::DirectX, Self::sbc),
            0xF7 => self.read_a(bus, Mode::DirectIndirectLongIndexedY, Self::sbc),
            0xF9 => self.read_a(bus, Mode::AbsoluteY, Self::sbc),
            0xFD => self.read_a(bus, Mode::AbsoluteX, Self::sbc),
            0xFF => self.read_a(bus, Mode::AbsoluteLongX, Self::sbc),

            // Shifts, rotates, INC/DEC, TSB/TRB
            0x06 => self.modify(bus, Mode::Direct, Self::asl),
            0x0A => self.modify_a(Self::asl),
            0x0E => self.modify(bus, Mode::Absolute, Self::asl),
            0x16 => self.modify(bus, Mode::DirectX, Self::asl),
            0x1E => self.modify(bus, Mode::AbsoluteX, Self::asl),
            0x26 => self.modify(bus, Mode::Direct, Self::rol),
            0x2A => self.modify_a(Self::rol),
            0x2E => self.modify(bus, Mode::Absolute, Self::rol),
            0x36 => self.modify(bus, Mode::DirectX, Self::rol),
            0x3E => self.modify(bus, Mode::AbsoluteX, Self::rol),
            0x46 => self.modify(bus, Mode::Direct, Self::lsr),
            0x4A => self.modify_a(Self::lsr),
            0x4E => self.modify(bus, Mode::Absolute, Self::lsr),
            0x56 => self.modify(bus, Mode::DirectX, Self::lsr),
            0x5E => self.modify(bus, Mode::AbsoluteX, Self::lsr),
            0x66 => self.modify(bus, Mode::Direct, Self::ror),
            0x6A => self.modify_a(Self::ror),
            0x6E => self.modify(bus, Mode::Absolute, Self::ror),
            0x76 => self.modify(bus, Mode::DirectX, Self::ror),
            0x7E => self.modify(bus, Mode::AbsoluteX, Self::ror),
            0x1A => self.modify_a(Self::inc),
            0xE6 => self.modify(bus, Mode::Direct, Self::inc),
            0xEE => self.modify(bus, Mode::Absolute, Self::inc),
            0xF6 => self.modify(bus, Mode::DirectX, Self::inc),
            0xFE => self.modify(bus, Mode::AbsoluteX, Self::inc),
            0x3A => self.modify_a(Self::dec),
            0xC6 => self.modify(bus, Mode::Direct, Self::dec),
            0xCE => self.modify(bus, Mode::Absolute, Self::dec),
            0xD6 => self.modify(bus, Mode::DirectX, Self::dec),
            0xDE => self.modify(bus, Mode::AbsoluteX, Self::dec),
            0x04 => self.modify(bus, Mode::Direct, Self::tsb),
            0x0C => self.modify(bus, Mode::Absolute, Self::tsb),
            0x14 => self.modify(bus, Mode::Direct, Self::trb),
            0x1C => self.modify(bus, Mode::Absolute, Self::trb),

            // BIT
            0x24 => self.read_a(bus, Mode::Direct, Self::bit),
            0x2C => self.read_a(bus, Mode::Absolute, Self::bit),
            0x34 => self.read_a(bus, Mode::DirectX, Self::bit),
            0x3C => self.read_a(bus, Mode::AbsoluteX, Self::bit),
            0x89 => self.read_a(bus, Mode::ImmediateM, Self::bit_immediate),

            // STZ, STX, STY
            0x64 => self.store_zero(bus, Mode::Direct),
            0x74 => self.store_zero(bus, Mode::DirectX),
            0x9C => self.store_zero(bus, Mode::Absolute),
            0x9E => self.store_zero(bus, Mode::AbsoluteX),
            0x86 => self.store_index(bus, Mode::Direct, self.regs.x),
            0x8E => self.store_index(bus, Mode::Absolute, self.regs.x),
            0x96 => self.store_index(bus, Mode::DirectY, self.regs.x),
            0x84 => self.store_index(bus, Mode::Direct, self.regs.y),
            0x8C => self.store_index(bus, Mode::Absolute, self.regs.y),
            0x94 => self.store_index(bus, Mode::DirectX, self.regs.y),

            // LDX, LDY, CPX, CPY
            0xA2 => self.read_index(bus, Mode::ImmediateX, Self::ldx),
            0xA6 => self.read_index(bus, Mode::Direct, Self::ldx),
            0xAE => self.read_index(bus, Mode::Absolute, Self::ldx),
            0xB6 => self.read_index(bus, Mode::DirectY, Self::ldx),
            0xBE => self.read_index(bus, Mode::AbsoluteY, Self::ldx),
            0xA0 => self.read_index(bus, Mode::ImmediateX, Self::ldy),
            0xA4 => self.read_index(bus, Mode::Direct, Self::ldy),
            0xAC => self.read_index(bus, Mode::Absolute, Self::ldy),
            0xB4 => self.read_index(bus, Mode::DirectX, Self::ldy),
            0xBC => self.read_index(bus, Mode::AbsoluteX, Self::ldy),
            0xE0 => self.read_index(bus, Mode::ImmediateX, Self::cpx),
            0xE4 => self.read_index(bus, Mode::Direct, Self::cpx),
            0xEC => self.read_index(bus, Mode::Absolute, Self::cpx),
            0xC0 => self.read_index(bus, Mode::ImmediateX, Self::cpy),
            0xC4 => self.read_index(bus, Mode::Direct, Self::cpy),
            0xCC => self.read_index(bus, Mode::Absolute, Self::cpy),

            // Branches
            0x10 => self.branch(bus, !self.regs.p.is_set(N)),
            0x30 => self.branch(bus, self.regs.p.is_set(N)),
            0x50 => self.branch(bus, !self.regs.p.is_set(V)),
            0x70 => self.branch(bus, self.regs.p.is_set(V)),
            0x90 => self.branch(bus, !self.regs.p.is_set(C)),
            0xB0 => self.branch(bus, self.regs.p.is_set(C)),
            0xD0 => self.branch(bus, !self.regs.p.is_set(Z)),
            0xF0 => self.branch(bus, self.regs.p.is_set(Z)),
            0x80 => self.branch(bus, true),
            0x82 => {
                let offset = self.fetch16(bus);
                self.regs.pc = self.regs.pc.wrapping_add(offset);
            }

            // Jumps and calls
            0x4C => {
                self.regs.pc = self.fetch16(bus);
            }
            0x5C => self.jump_long(bus, Mode::AbsoluteLong),
            0x6C => self.jump(bus, Mode::AbsoluteIndirect),
            0x7C => self.jump(bus, Mode::AbsoluteIndexedIndirect),
            0xDC => self.jump_long(bus, Mode::AbsoluteIndirectLong),
            0x20 => {
                let target = self.fetch16(bus);
                self.push16(bus, self.regs.pc.wrapping_sub(1));
                self.regs.pc = target;
            }
            0xFC => {
                let target = self.effective_address(bus, Mode::AbsoluteIndexedIndirect);
                self.push16(bus, self.regs.pc.wrapping_sub(1));
                self.regs.pc = target as u16;
            }
            0x22 => {
                let target = self.fetch24(bus);
                self.push8(bus, self.regs.pb);
                self.push16(bus, self.regs.pc.wrapping_sub(1));
                self.regs.pb = (target >> 16) as u8;
                self.regs.pc = target as u16;
            }
            0x60 => {
                self.regs.pc = self.pull16(bus).wrapping_add(1);
            }
            0x6B => {
                self.regs.pc = self.pull16(bus).wrapping_add(1);
                self.regs.pb = self.pull8(bus);
            }
            0x40 => {
                self.regs.p.0 = self.pull8(bus);
                self.regs.enforce_widths();
                self.regs.pc = self.pull16(bus);
                if !self.regs.e {
                    self.regs.pb = self.pull8(bus);
                    self.extra_cycles += 1;
                }
            }

            // Software interrupts and halts
            0x00 => {
                self.fetch8(bus);
                return self.enter_interrupt(bus, Interrupt::Brk);
            }
            0x02 => {
                self.fetch8(bus);
                return self.enter_interrupt(bus, Interrupt::Cop);
            }
            0xCB => self.state = State::Waiting,
            0xDB => self.state = State::Stopped,

            // Flags
            0x18 => self.regs.p.clear(C),
            0x38 => self.regs.p.set(C),
            0x58 => self.regs.p.clear(I),
            0x78 => self.regs.p.set(I),
            0xB8 => self.regs.p.clear(V),
            0xD8 => self.regs.p.clear(D),
            0xF8 => self.regs.p.set(D),
            0xC2 => {
                let mask = self.fetch8(bus);
                self.regs.p.clear(mask);
                self.regs.enforce_widths();
            }
            0xE2 => {
                let mask = self.fetch8(bus);
                self.regs.p.set(mask);
                self.regs.enforce_widths();
            }
            0xFB => {
                let carry = self.regs.p.is_set(C);
                self.regs.p.set_if(C, self.regs.e);
                self.regs.e = carry;
                self.regs.enforce_widths();
            }

            // Transfers
            0xAA => self.transfer_to_index(self.regs.a, true),
            0xA8 => self.transfer_to_index(self.regs.a, false),
            0x8A => self.transfer_to_a(self.regs.x),
            0x98 => self.transfer_to_a(self.regs.y),
            0xBA => self.transfer_to_index(self.regs.s, true),
            0x9B => self.transfer_to_index(self.regs.x, false),
            0xBB => self.transfer_to_index(self.regs.y, true),
            0x9A => {
                self.regs.s = self.regs.x;
                self.regs.enforce_widths();
            }
            0x1B => {
                self.regs.s = self.regs.a;
                self.regs.enforce_widths();
            }
            0x3B => {
                self.regs.a = self.regs.s;
                self.regs.p.update_nz(self.regs.a, true);
            }
            0x5B => {
                self.regs.d = self.regs.a;
                self.regs.p.update_nz(self.regs.d, true);
            }
            0x7B => {
                self.regs.a = self.regs.d;
                self.regs.p.update_nz(self.regs.a, true);
            }
            0xEB => {
                self.regs.a = self.regs.a.swap_bytes();
                self.regs.p.update_nz(self.regs.a & 0xFF, false);
            }

            // Stack
            0x48 => {
                let value = self.regs.a;
                if self.regs.accumulator_is_wide() {
                    self.push16(bus, value);
                } else {
                    self.push8(bus, value as u8);
                }
            }
            0xDA => self.push_index(bus, self.regs.x),
            0x5A => self.push_index(bus, self.regs.y),
            0x68 => {
                let value = if self.regs.accumulator_is_wide() {
                    self.pull16(bus)
                } else {
                    u16::from(self.pull8(bus))
                };
                self.lda(value);
            }
            0xFA => {
                let value = self.pull_index(bus);
                self.ldx(value);
            }
            0x7A => {
                let value = self.pull_index(bus);
                self.ldy(value);
            }
            0x08 => self.push8(bus, self.regs.p.0),
            0x28 => {
                self.regs.p.0 = self.pull8(bus);
                self.regs.enforce_widths();
            }
            0x8B => self.push8(bus, self.regs.db),
            0xAB => {
                self.regs.db = self.pull8(bus);
                self.regs.p.update_nz(u16::from(self.regs.db), false);
            }
            0x0B => self.push16(bus, self.regs.d),
            0x2B => {
                self.regs.d = self.pull16(bus);
                self.regs.p.update_nz(self.regs.d, true);
            }
            0x4B => self.push8(bus, self.regs.pb),
            0xF4 => {
                let value = self.fetch16(bus);
                self.push16(bus, value);
            }
            0xD4 => {
                let addr = self.effective_address(bus, Mode::Direct);
                let value = self.read_data(bus, Mode::Direct, addr, true);
                self.extra_cycles -= 1;
                self.push16(bus, value);
            }
            0x62 => {
                let offset = self.fetch16(bus);
                self.push16(bus, self.regs.pc.wrapping_add(offset));
            }

            // Index increments
            0xE8 => self.regs.x = self.step_index(self.regs.x, 1),
            0xC8 => self.regs.y = self.step_index(self.regs.y, 1),
            0xCA => self.regs.x = self.step_index(self.regs.x, u16::MAX),
            0x88 => self.regs.y = self.step_index(self.regs.y, u16::MAX),

            // Block moves
            0x54 => self.block_move(bus, 1),
            0x44 => self.block_move(bus, u16::MAX),

            0xEA => {}

            // WDM is reserved: skip the signature byte.
            _ => {
                let operand = self.fetch8(bus);
                log::warn!(
                    "Unknown opcode {opcode:02X} {operand:02X} at {:06X}, skipped",
                    self.regs.pc_long().wrapping_sub(2) & 0x00FF_FFFF
                );
            }
        }
        u32::from(BASE_CYCLES[usize::from(opcode)])
    }

    // ------------------------------------------------------------------
    // Instruction shapes
    // ------------------------------------------------------------------

    fn read_a<B: Bus>(&mut self, bus: &mut B, mode: Mode, op: fn(&mut Self, u16)) {
        let wide = self.regs.accumulator_is_wide();
        let addr = self.effective_address(bus, mode);
        let value = self.read_data(bus, mode, addr, wide);
        op(self, value);
    }

    fn read_index<B: Bus>(&mut self, bus: &mut B, mode: Mode, op: fn(&mut Self, u16)) {
        let wide = self.regs.index_is_wide();
        let addr = self.effective_address(bus, mode);
        let value = self.read_data(bus, mode, addr, wide);
        op(self, value);
    }

    fn store_a<B: Bus>(&mut self, bus: &mut B, mode: Mode) {
        let wide = self.regs.accumulator_is_wide();
        let addr = self.effective_address(bus, mode);
        self.write_data(bus, mode, addr, self.regs.a, wide);
    }

    fn store_zero<B: Bus>(&mut self, bus: &mut B, mode: Mode) {
        let wide = self.regs.accumulator_is_wide();
        let addr = self.effective_address(bus, mode);
        self.write_data(bus, mode, addr, 0, wide);
    }

    fn store_index<B: Bus>(&mut self, bus: &mut B, mode: Mode, value: u16) {
        let wide = self.regs.index_is_wide();
        let addr = self.effective_address(bus, mode);
        self.write_data(bus, mode, addr, value, wide);
    }

    fn modify<B: Bus>(&mut self, bus: &mut B, mode: Mode, op: fn(&mut Self, u16) -> u16) {
        let wide = self.regs.accumulator_is_wide();
        let addr = self.effective_address(bus, mode);
        let value = self.read_data(bus, mode, addr, wide);
        let result = op(self, value);
        self.write_data(bus, mode, addr, result, wide);
    }

    fn branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.fetch8(bus) as i8;
        if taken {
            let target = self.regs.pc.wrapping_add(offset as i16 as u16);
            self.extra_cycles += 1;
            if self.regs.e && (target & 0xFF00) != (self.regs.pc & 0xFF00) {
                self.extra_cycles += 1;
            }
            self.regs.pc = target;
        }
    }

    fn jump<B: Bus>(&mut self, bus: &mut B, mode: Mode) {
        let target = self.effective_address(bus, mode);
        self.regs.pc = target as u16;
    }

    fn jump_long<B: Bus>(&mut self, bus: &mut B, mode: Mode) {
        let target = self.effective_address(bus, mode);
        self.regs.pb = (target >> 16) as u8;
        self.regs.pc = target as u16;
    }

    fn transfer_to_index(&mut self, value: u16, to_x: bool) {
        let wide = self.regs.index_is_wide();
        let value = if wide { value } else { value & 0xFF };
        if to_x {
            self.regs.x = value;
        } else {
            self.regs.y = value;
        }
        self.regs.p.update_nz(value, wide);
    }

    fn transfer_to_a(&mut self, value: u16) {
        self.lda(value);
    }

    fn step_index(&mut self, value: u16, delta: u16) -> u16 {
        let wide = self.regs.index_is_wide();
        let result = if wide {
            value.wrapping_add(delta)
        } else {
            value.wrapping_add(delta) & 0xFF
        };
        self.regs.p.update_nz(result, wide);
        result
    }

    fn push_index<B: Bus>(&mut self, bus: &mut B, value: u16) {
        if self.regs.index_is_wide() {
            self.push16(bus, value);
        } else {
            self.push8(bus, value as u8);
        }
    }

    fn pull_index<B: Bus>(&mut self, bus: &mut B) -> u16 {
        if self.regs.index_is_wide() {
            self.pull16(bus)
        } else {
            u16::from(self.pull8(bus))
        }
    }

    /// MVN/MVP: move one byte per step, re-executing until A wraps past 0.
    fn block_move<B: Bus>(&mut self, bus: &mut B, delta: u16) {
        let dest_bank = self.fetch8(bus);
        let src_bank = self.fetch8(bus);
        self.regs.db = dest_bank;
        let value = bus.read((u32::from(src_bank) << 16) | u32::from(self.regs.x));
        bus.write((u32::from(dest_bank) << 16) | u32::from(self.regs.y), value);

        let wide = self.regs.index_is_wide();
        let mask = if wide { 0xFFFF } else { 0x00FF };
        self.regs.x = self.regs.x.wrapping_add(delta) & mask;
        self.regs.y = self.regs.y.wrapping_add(delta) & mask;
        self.regs.a = self.regs.a.wrapping_sub(1);
        if self.regs.a != 0xFFFF {
            self.regs.pc = self.regs.pc.wrapping_sub(3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{M, X};
    use emu_core::{Cpu, SimpleBus};

    fn native16(cpu: &mut Wdc65816) {
        cpu.regs.e = false;
        cpu.regs.p.clear(M | X);
    }

    #[test]
    fn test_lda_immediate_16bit() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        native16(&mut cpu);
        bus.load(0x0000, &[0xA9, 0x34, 0x12]);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a, 0x1234);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn test_rep_sep_truncate_index() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        native16(&mut cpu);
        cpu.regs.x = 0x1234;
        // SEP #$10
        bus.load(0x0000, &[0xE2, 0x10]);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.x, 0x0034, "setting X must clear the index high bytes");
    }

    #[test]
    fn test_xce_enters_native_mode() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        // CLC; XCE
        bus.load(0x0000, &[0x18, 0xFB]);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert!(!cpu.regs.e);
        assert!(cpu.regs.p.is_set(C), "old E lands in carry");
        assert!(cpu.regs.p.is_set(M), "widths stay 8-bit until REP");
    }

    #[test]
    fn test_emulation_mode_ignores_rep() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        // REP #$30; LDA #$12
        bus.load(0x0000, &[0xC2, 0x30, 0xA9, 0x12, 0xEA]);
        cpu.step(&mut bus);
        assert!(cpu.regs.p.is_set(M) && cpu.regs.p.is_set(X));
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 4, "immediate stays one byte in emulation mode");
    }

    #[test]
    fn test_mvn_moves_block() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        native16(&mut cpu);
        bus.load(0x01_2000, &[1, 2, 3, 4]);
        cpu.regs.a = 3;
        cpu.regs.x = 0x2000;
        cpu.regs.y = 0x3000;
        // MVN $7E,$01
        bus.load(0x0000, &[0x54, 0x7E, 0x01]);
        for _ in 0..4 {
            cpu.step(&mut bus);
        }
        assert_eq!(cpu.regs.pc, 3);
        assert_eq!(cpu.regs.a, 0xFFFF);
        assert_eq!(cpu.regs.db, 0x7E);
        for i in 0..4 {
            assert_eq!(bus.peek(0x7E_3000 + i), (i + 1) as u8);
        }
    }

    #[test]
    fn test_wdm_is_skipped() {
        let mut cpu = Wdc65816::new();
        let mut bus = SimpleBus::new();
        bus.load(0x0000, &[0x42, 0x99, 0xEA]);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 2);
        assert!(!cpu.is_halted());
    }
}
