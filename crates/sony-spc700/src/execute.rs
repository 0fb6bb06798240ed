//! SPC700 instruction decode and execution.
//!
//! The opcode map is regular: the low nibble mostly picks the addressing
//! mode and the high three bits pick the operation, so the ALU and shift
//! groups share helpers keyed on `opcode >> 5`. Every opcode still gets
//! its own arm so the mode pairing is visible in the match.

use emu_core::Bus;

use crate::flags::{self, C, H, I, N, P, V, Z};
use crate::{Spc700, State, read16};

/// Base cycle counts. Taken branches add two.
const CYCLES: [u8; 256] = [
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 4, 6, 8, // 0x00
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 6, 5, 2, 2, 4, 6, // 0x10
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 4, 5, 2, // 0x20
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 6, 5, 2, 2, 3, 8, // 0x30
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 4, 6, 6, // 0x40
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 4, 5, 2, 2, 4, 3, // 0x50
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 4, 5, 5, // 0x60
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 3, 6, // 0x70
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 2, 4, 5, // 0x80
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 12, 5, // 0x90
    3, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 2, 4, 4, // 0xA0
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 3, 4, // 0xB0
    3, 8, 4, 5, 4, 5, 4, 7, 2, 5, 6, 4, 5, 2, 4, 9, // 0xC0
    2, 8, 4, 5, 5, 6, 6, 7, 4, 5, 5, 5, 2, 2, 6, 3, // 0xD0
    2, 8, 4, 5, 3, 4, 3, 6, 2, 4, 5, 3, 4, 3, 4, 3, // 0xE0
    2, 8, 4, 5, 4, 5, 5, 6, 3, 4, 5, 4, 2, 2, 4, 3, // 0xF0
];

/// Two-operand ALU operations, indexed by `opcode >> 5` in rows $0x-$Bx.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alu {
    Or,
    And,
    Eor,
    Cmp,
    Adc,
    Sbc,
}

const ALU_ROWS: [Alu; 6] = [Alu::Or, Alu::And, Alu::Eor, Alu::Cmp, Alu::Adc, Alu::Sbc];

/// Read-modify-write operations, indexed the same way.
#[derive(Debug, Clone, Copy)]
enum Rmw {
    Asl,
    Rol,
    Lsr,
    Ror,
    Dec,
    Inc,
}

const RMW_ROWS: [Rmw; 6] = [Rmw::Asl, Rmw::Rol, Rmw::Lsr, Rmw::Ror, Rmw::Dec, Rmw::Inc];

fn alu_for(opcode: u8) -> Alu {
    ALU_ROWS[usize::from(opcode >> 5)]
}

fn rmw_for(opcode: u8) -> Rmw {
    RMW_ROWS[usize::from(opcode >> 5)]
}

impl Spc700 {
    // ------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------

    fn addr_dp<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let offset = self.fetch(bus);
        self.dp(offset)
    }

    fn addr_dp_x<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let offset = self.fetch(bus).wrapping_add(self.regs.x);
        self.dp(offset)
    }

    fn addr_dp_y<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let offset = self.fetch(bus).wrapping_add(self.regs.y);
        self.dp(offset)
    }

    fn addr_abs_x<B: Bus>(&mut self, bus: &mut B) -> u16 {
        self.fetch16(bus).wrapping_add(u16::from(self.regs.x))
    }

    fn addr_abs_y<B: Bus>(&mut self, bus: &mut B) -> u16 {
        self.fetch16(bus).wrapping_add(u16::from(self.regs.y))
    }

    /// `(X)`
    fn addr_ind_x(&self) -> u16 {
        self.dp(self.regs.x)
    }

    /// `[d+X]`
    fn addr_dp_x_ind<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let offset = self.fetch(bus).wrapping_add(self.regs.x);
        self.read_dp16(bus, offset)
    }

    /// `[d]+Y`
    fn addr_dp_ind_y<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let offset = self.fetch(bus);
        self.read_dp16(bus, offset).wrapping_add(u16::from(self.regs.y))
    }

    /// `m.b`: 13-bit address plus a 3-bit bit number in the top bits.
    fn addr_mem_bit<B: Bus>(&mut self, bus: &mut B) -> (u16, u8) {
        let operand = self.fetch16(bus);
        (operand & 0x1FFF, (operand >> 13) as u8)
    }

    fn read<B: Bus>(bus: &mut B, address: u16) -> u8 {
        bus.read(u32::from(address))
    }

    fn write<B: Bus>(bus: &mut B, address: u16, value: u8) {
        bus.write(u32::from(address), value);
    }

    // ------------------------------------------------------------------
    // ALU
    // ------------------------------------------------------------------

    fn adc(&mut self, a: u8, b: u8) -> u8 {
        let sum = u16::from(a) + u16::from(b) + u16::from(self.regs.flag(C));
        let result = sum as u8;
        self.regs.set_flag(C, sum > 0xFF);
        self.regs.set_flag(H, (a ^ b ^ result) & 0x10 != 0);
        self.regs.set_flag(V, !(a ^ b) & (a ^ result) & 0x80 != 0);
        self.regs.update_nz(result);
        result
    }

    fn compare(&mut self, a: u8, b: u8) {
        self.regs.set_flag(C, a >= b);
        self.regs.update_nz(a.wrapping_sub(b));
    }

    /// Apply `op` and return the value to store. CMP returns `lhs`
    /// unchanged; callers skip the store for it.
    fn alu(&mut self, op: Alu, lhs: u8, rhs: u8) -> u8 {
        match op {
            Alu::Or => {
                let r = lhs | rhs;
                self.regs.update_nz(r);
                r
            }
            Alu::And => {
                let r = lhs & rhs;
                self.regs.update_nz(r);
                r
            }
            Alu::Eor => {
                let r = lhs ^ rhs;
                self.regs.update_nz(r);
                r
            }
            Alu::Cmp => {
                self.compare(lhs, rhs);
                lhs
            }
            Alu::Adc => self.adc(lhs, rhs),
            Alu::Sbc => self.adc(lhs, !rhs),
        }
    }

    fn alu_a(&mut self, op: Alu, rhs: u8) {
        self.regs.a = self.alu(op, self.regs.a, rhs);
    }

    /// ALU op with a memory destination.
    fn alu_mem<B: Bus>(&mut self, bus: &mut B, op: Alu, dest: u16, rhs: u8) {
        let lhs = Self::read(bus, dest);
        let result = self.alu(op, lhs, rhs);
        if op != Alu::Cmp {
            Self::write(bus, dest, result);
        }
    }

    fn rmw(&mut self, op: Rmw, value: u8) -> u8 {
        let carry = u8::from(self.regs.flag(C));
        let result = match op {
            Rmw::Asl => {
                self.regs.set_flag(C, value & 0x80 != 0);
                value << 1
            }
            Rmw::Rol => {
                self.regs.set_flag(C, value & 0x80 != 0);
                (value << 1) | carry
            }
            Rmw::Lsr => {
                self.regs.set_flag(C, value & 0x01 != 0);
                value >> 1
            }
            Rmw::Ror => {
                self.regs.set_flag(C, value & 0x01 != 0);
                (value >> 1) | (carry << 7)
            }
            Rmw::Dec => value.wrapping_sub(1),
            Rmw::Inc => value.wrapping_add(1),
        };
        self.regs.update_nz(result);
        result
    }

    fn rmw_mem<B: Bus>(&mut self, bus: &mut B, op: Rmw, address: u16) {
        let value = Self::read(bus, address);
        let result = self.rmw(op, value);
        Self::write(bus, address, result);
    }

    fn add_word(&mut self, rhs: u16, carry_in: bool) {
        let ya = self.regs.ya();
        let sum = u32::from(ya) + u32::from(rhs) + u32::from(carry_in);
        let result = sum as u16;
        self.regs.set_flag(C, sum > 0xFFFF);
        self.regs.set_flag(H, (ya ^ rhs ^ result) & 0x1000 != 0);
        self.regs.set_flag(V, !(ya ^ rhs) & (ya ^ result) & 0x8000 != 0);
        self.regs.update_nz16(result);
        self.regs.set_ya(result);
    }

    fn divide(&mut self) {
        let ya = u32::from(self.regs.ya());
        let x = u32::from(self.regs.x);
        let y = u32::from(self.regs.y);
        self.regs.set_flag(V, y >= x);
        self.regs.set_flag(H, (y & 0x0F) >= (x & 0x0F));
        if y < x << 1 {
            self.regs.a = (ya / x) as u8;
            self.regs.y = (ya % x) as u8;
        } else {
            // Quotient overflow: the hardware divider keeps shifting and
            // produces these values.
            let rest = ya.wrapping_sub(x << 9);
            let divisor = 256 - x;
            self.regs.a = 255u32.wrapping_sub(rest / divisor) as u8;
            self.regs.y = (x + rest % divisor) as u8;
        }
        self.regs.update_nz(self.regs.a);
    }

    fn decimal_adjust_add(&mut self) {
        if self.regs.flag(C) || self.regs.a > 0x99 {
            self.regs.a = self.regs.a.wrapping_add(0x60);
            self.regs.set_flag(C, true);
        }
        if self.regs.flag(H) || self.regs.a & 0x0F > 0x09 {
            self.regs.a = self.regs.a.wrapping_add(0x06);
        }
        self.regs.update_nz(self.regs.a);
    }

    fn decimal_adjust_sub(&mut self) {
        if !self.regs.flag(C) || self.regs.a > 0x99 {
            self.regs.a = self.regs.a.wrapping_sub(0x60);
            self.regs.set_flag(C, false);
        }
        if !self.regs.flag(H) || self.regs.a & 0x0F > 0x09 {
            self.regs.a = self.regs.a.wrapping_sub(0x06);
        }
        self.regs.update_nz(self.regs.a);
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    fn branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.fetch(bus) as i8;
        if taken {
            self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
            self.extra_cycles += 2;
        }
    }

    fn call<B: Bus>(&mut self, bus: &mut B, target: u16) {
        self.push16(bus, self.regs.pc);
        self.regs.pc = target;
    }

    /// Execute one opcode and return its base cycle count.
    pub(crate) fn execute<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u32 {
        match opcode {
            // ----------------------------------------------------------
            // Column 0: branches and flag ops
            // ----------------------------------------------------------
            0x00 => {}
            0x10 => self.branch(bus, !self.regs.flag(N)),
            0x30 => self.branch(bus, self.regs.flag(N)),
            0x50 => self.branch(bus, !self.regs.flag(V)),
            0x70 => self.branch(bus, self.regs.flag(V)),
            0x90 => self.branch(bus, !self.regs.flag(C)),
            0xB0 => self.branch(bus, self.regs.flag(C)),
            0xD0 => self.branch(bus, !self.regs.flag(Z)),
            0xF0 => self.branch(bus, self.regs.flag(Z)),
            0x20 => self.regs.set_flag(P, false),
            0x40 => self.regs.set_flag(P, true),
            0x60 => self.regs.set_flag(C, false),
            0x80 => self.regs.set_flag(C, true),
            0xA0 => self.regs.set_flag(I, true),
            0xC0 => self.regs.set_flag(I, false),
            0xE0 => {
                self.regs.set_flag(V, false);
                self.regs.set_flag(H, false);
            }

            // TCALL n
            0x01 | 0x11 | 0x21 | 0x31 | 0x41 | 0x51 | 0x61 | 0x71 | 0x81 | 0x91 | 0xA1 | 0xB1
            | 0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let vector = 0xFFDE - 2 * u16::from(opcode >> 4);
                let target = read16(bus, vector);
                self.call(bus, target);
            }

            // SET1 d.b / CLR1 d.b
            0x02 | 0x22 | 0x42 | 0x62 | 0x82 | 0xA2 | 0xC2 | 0xE2 => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address) | (1 << (opcode >> 5));
                Self::write(bus, address, value);
            }
            0x12 | 0x32 | 0x52 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address) & !(1 << (opcode >> 5));
                Self::write(bus, address, value);
            }

            // BBS d.b,r / BBC d.b,r
            0x03 | 0x23 | 0x43 | 0x63 | 0x83 | 0xA3 | 0xC3 | 0xE3 => {
                let address = self.addr_dp(bus);
                let set = Self::read(bus, address) & (1 << (opcode >> 5)) != 0;
                self.branch(bus, set);
            }
            0x13 | 0x33 | 0x53 | 0x73 | 0x93 | 0xB3 | 0xD3 | 0xF3 => {
                let address = self.addr_dp(bus);
                let set = Self::read(bus, address) & (1 << (opcode >> 5)) != 0;
                self.branch(bus, !set);
            }

            // ----------------------------------------------------------
            // ALU with A as destination
            // ----------------------------------------------------------
            0x04 | 0x24 | 0x44 | 0x64 | 0x84 | 0xA4 => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x14 | 0x34 | 0x54 | 0x74 | 0x94 | 0xB4 => {
                let address = self.addr_dp_x(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x05 | 0x25 | 0x45 | 0x65 | 0x85 | 0xA5 => {
                let address = self.fetch16(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x15 | 0x35 | 0x55 | 0x75 | 0x95 | 0xB5 => {
                let address = self.addr_abs_x(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x06 | 0x26 | 0x46 | 0x66 | 0x86 | 0xA6 => {
                let value = Self::read(bus, self.addr_ind_x());
                self.alu_a(alu_for(opcode), value);
            }
            0x16 | 0x36 | 0x56 | 0x76 | 0x96 | 0xB6 => {
                let address = self.addr_abs_y(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x07 | 0x27 | 0x47 | 0x67 | 0x87 | 0xA7 => {
                let address = self.addr_dp_x_ind(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x17 | 0x37 | 0x57 | 0x77 | 0x97 | 0xB7 => {
                let address = self.addr_dp_ind_y(bus);
                let value = Self::read(bus, address);
                self.alu_a(alu_for(opcode), value);
            }
            0x08 | 0x28 | 0x48 | 0x68 | 0x88 | 0xA8 => {
                let value = self.fetch(bus);
                self.alu_a(alu_for(opcode), value);
            }

            // ALU with memory as destination
            0x18 | 0x38 | 0x58 | 0x78 | 0x98 | 0xB8 => {
                let value = self.fetch(bus);
                let dest = self.addr_dp(bus);
                self.alu_mem(bus, alu_for(opcode), dest, value);
            }
            0x09 | 0x29 | 0x49 | 0x69 | 0x89 | 0xA9 => {
                let source = self.addr_dp(bus);
                let value = Self::read(bus, source);
                let dest = self.addr_dp(bus);
                self.alu_mem(bus, alu_for(opcode), dest, value);
            }
            0x19 | 0x39 | 0x59 | 0x79 | 0x99 | 0xB9 => {
                let value = Self::read(bus, self.dp(self.regs.y));
                let dest = self.addr_ind_x();
                self.alu_mem(bus, alu_for(opcode), dest, value);
            }

            // ----------------------------------------------------------
            // Read-modify-write
            // ----------------------------------------------------------
            0x0B | 0x2B | 0x4B | 0x6B | 0x8B | 0xAB => {
                let address = self.addr_dp(bus);
                self.rmw_mem(bus, rmw_for(opcode), address);
            }
            0x1B | 0x3B | 0x5B | 0x7B | 0x9B | 0xBB => {
                let address = self.addr_dp_x(bus);
                self.rmw_mem(bus, rmw_for(opcode), address);
            }
            0x0C | 0x2C | 0x4C | 0x6C | 0x8C | 0xAC => {
                let address = self.fetch16(bus);
                self.rmw_mem(bus, rmw_for(opcode), address);
            }
            0x1C | 0x3C | 0x5C | 0x7C | 0x9C | 0xBC => {
                self.regs.a = self.rmw(rmw_for(opcode), self.regs.a);
            }
            0x1D => self.regs.x = self.rmw(Rmw::Dec, self.regs.x),
            0x3D => self.regs.x = self.rmw(Rmw::Inc, self.regs.x),
            0xDC => self.regs.y = self.rmw(Rmw::Dec, self.regs.y),
            0xFC => self.regs.y = self.rmw(Rmw::Inc, self.regs.y),

            // ----------------------------------------------------------
            // Moves
            // ----------------------------------------------------------
            0xC4 => {
                let address = self.addr_dp(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xD4 => {
                let address = self.addr_dp_x(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xC5 => {
                let address = self.fetch16(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xD5 => {
                let address = self.addr_abs_x(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xC6 => Self::write(bus, self.addr_ind_x(), self.regs.a),
            0xD6 => {
                let address = self.addr_abs_y(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xC7 => {
                let address = self.addr_dp_x_ind(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xD7 => {
                let address = self.addr_dp_ind_y(bus);
                Self::write(bus, address, self.regs.a);
            }
            0xAF => {
                Self::write(bus, self.addr_ind_x(), self.regs.a);
                self.regs.x = self.regs.x.wrapping_add(1);
            }
            0xD8 => {
                let address = self.addr_dp(bus);
                Self::write(bus, address, self.regs.x);
            }
            0xD9 => {
                let address = self.addr_dp_y(bus);
                Self::write(bus, address, self.regs.x);
            }
            0xC9 => {
                let address = self.fetch16(bus);
                Self::write(bus, address, self.regs.x);
            }
            0xCB => {
                let address = self.addr_dp(bus);
                Self::write(bus, address, self.regs.y);
            }
            0xDB => {
                let address = self.addr_dp_x(bus);
                Self::write(bus, address, self.regs.y);
            }
            0xCC => {
                let address = self.fetch16(bus);
                Self::write(bus, address, self.regs.y);
            }
            0x8F => {
                let value = self.fetch(bus);
                let address = self.addr_dp(bus);
                Self::write(bus, address, value);
            }
            0xFA => {
                let source = self.addr_dp(bus);
                let value = Self::read(bus, source);
                let dest = self.addr_dp(bus);
                Self::write(bus, dest, value);
            }

            0xE4 => {
                let address = self.addr_dp(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xF4 => {
                let address = self.addr_dp_x(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xE5 => {
                let address = self.fetch16(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xF5 => {
                let address = self.addr_abs_x(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xE6 => {
                self.regs.a = Self::read(bus, self.addr_ind_x());
                self.regs.update_nz(self.regs.a);
            }
            0xF6 => {
                let address = self.addr_abs_y(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xE7 => {
                let address = self.addr_dp_x_ind(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xF7 => {
                let address = self.addr_dp_ind_y(bus);
                self.regs.a = Self::read(bus, address);
                self.regs.update_nz(self.regs.a);
            }
            0xE8 => {
                self.regs.a = self.fetch(bus);
                self.regs.update_nz(self.regs.a);
            }
            0xBF => {
                self.regs.a = Self::read(bus, self.addr_ind_x());
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.update_nz(self.regs.a);
            }
            0xF8 => {
                let address = self.addr_dp(bus);
                self.regs.x = Self::read(bus, address);
                self.regs.update_nz(self.regs.x);
            }
            0xF9 => {
                let address = self.addr_dp_y(bus);
                self.regs.x = Self::read(bus, address);
                self.regs.update_nz(self.regs.x);
            }
            0xE9 => {
                let address = self.fetch16(bus);
                self.regs.x = Self::read(bus, address);
                self.regs.update_nz(self.regs.x);
            }
            0xCD => {
                self.regs.x = self.fetch(bus);
                self.regs.update_nz(self.regs.x);
            }
            0xEB => {
                let address = self.addr_dp(bus);
                self.regs.y = Self::read(bus, address);
                self.regs.update_nz(self.regs.y);
            }
            0xFB => {
                let address = self.addr_dp_x(bus);
                self.regs.y = Self::read(bus, address);
                self.regs.update_nz(self.regs.y);
            }
            0xEC => {
                let address = self.fetch16(bus);
                self.regs.y = Self::read(bus, address);
                self.regs.update_nz(self.regs.y);
            }
            0x8D => {
                self.regs.y = self.fetch(bus);
                self.regs.update_nz(self.regs.y);
            }

            // Register transfers
            0x5D => {
                self.regs.x = self.regs.a;
                self.regs.update_nz(self.regs.x);
            }
            0x7D => {
                self.regs.a = self.regs.x;
                self.regs.update_nz(self.regs.a);
            }
            0xDD => {
                self.regs.a = self.regs.y;
                self.regs.update_nz(self.regs.a);
            }
            0xFD => {
                self.regs.y = self.regs.a;
                self.regs.update_nz(self.regs.y);
            }
            0x9D => {
                self.regs.x = self.regs.sp;
                self.regs.update_nz(self.regs.x);
            }
            0xBD => self.regs.sp = self.regs.x,

            // ----------------------------------------------------------
            // Compares on X and Y
            // ----------------------------------------------------------
            0xC8 => {
                let value = self.fetch(bus);
                self.compare(self.regs.x, value);
            }
            0x3E => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address);
                self.compare(self.regs.x, value);
            }
            0x1E => {
                let address = self.fetch16(bus);
                let value = Self::read(bus, address);
                self.compare(self.regs.x, value);
            }
            0xAD => {
                let value = self.fetch(bus);
                self.compare(self.regs.y, value);
            }
            0x7E => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address);
                self.compare(self.regs.y, value);
            }
            0x5E => {
                let address = self.fetch16(bus);
                let value = Self::read(bus, address);
                self.compare(self.regs.y, value);
            }

            // ----------------------------------------------------------
            // 16-bit word ops on YA
            // ----------------------------------------------------------
            0x1A | 0x3A => {
                let offset = self.fetch(bus);
                let value = self.read_dp16(bus, offset);
                let result = if opcode == 0x3A {
                    value.wrapping_add(1)
                } else {
                    value.wrapping_sub(1)
                };
                self.write_dp16(bus, offset, result);
                self.regs.update_nz16(result);
            }
            0x5A => {
                let offset = self.fetch(bus);
                let value = self.read_dp16(bus, offset);
                let ya = self.regs.ya();
                self.regs.set_flag(C, ya >= value);
                self.regs.update_nz16(ya.wrapping_sub(value));
            }
            0x7A => {
                let offset = self.fetch(bus);
                let value = self.read_dp16(bus, offset);
                self.add_word(value, false);
            }
            0x9A => {
                let offset = self.fetch(bus);
                let value = self.read_dp16(bus, offset);
                self.add_word(!value, true);
            }
            0xBA => {
                let offset = self.fetch(bus);
                let value = self.read_dp16(bus, offset);
                self.regs.set_ya(value);
                self.regs.update_nz16(value);
            }
            0xDA => {
                let offset = self.fetch(bus);
                self.write_dp16(bus, offset, self.regs.ya());
            }
            0xCF => {
                let product = u16::from(self.regs.y) * u16::from(self.regs.a);
                self.regs.set_ya(product);
                self.regs.update_nz(self.regs.y);
            }
            0x9E => self.divide(),
            0xDF => self.decimal_adjust_add(),
            0xBE => self.decimal_adjust_sub(),
            0x9F => {
                self.regs.a = self.regs.a.rotate_left(4);
                self.regs.update_nz(self.regs.a);
            }

            // ----------------------------------------------------------
            // Single-bit ops on absolute memory
            // ----------------------------------------------------------
            0x0A | 0x2A | 0x4A | 0x6A | 0x8A | 0xAA => {
                let (address, bit) = self.addr_mem_bit(bus);
                let mut value = Self::read(bus, address) & (1 << bit) != 0;
                if opcode & 0x20 != 0 && opcode != 0xAA {
                    value = !value;
                }
                let carry = self.regs.flag(C);
                let result = match opcode {
                    0x0A | 0x2A => carry | value,
                    0x4A | 0x6A => carry & value,
                    0x8A => carry ^ value,
                    _ => value,
                };
                self.regs.set_flag(C, result);
            }
            0xCA => {
                let (address, bit) = self.addr_mem_bit(bus);
                let value = Self::read(bus, address) & !(1 << bit);
                let carry = u8::from(self.regs.flag(C)) << bit;
                Self::write(bus, address, value | carry);
            }
            0xEA => {
                let (address, bit) = self.addr_mem_bit(bus);
                let value = Self::read(bus, address) ^ (1 << bit);
                Self::write(bus, address, value);
            }
            0x0E | 0x4E => {
                let address = self.fetch16(bus);
                let value = Self::read(bus, address);
                self.regs.update_nz(self.regs.a.wrapping_sub(value));
                let result = if opcode == 0x0E {
                    value | self.regs.a
                } else {
                    value & !self.regs.a
                };
                Self::write(bus, address, result);
            }

            // ----------------------------------------------------------
            // Compare-and-branch loops
            // ----------------------------------------------------------
            0x2E => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address);
                self.branch(bus, self.regs.a != value);
            }
            0xDE => {
                let address = self.addr_dp_x(bus);
                let value = Self::read(bus, address);
                self.branch(bus, self.regs.a != value);
            }
            0x6E => {
                let address = self.addr_dp(bus);
                let value = Self::read(bus, address).wrapping_sub(1);
                Self::write(bus, address, value);
                self.branch(bus, value != 0);
            }
            0xFE => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.branch(bus, self.regs.y != 0);
            }
            0x2F => self.branch(bus, true),

            // ----------------------------------------------------------
            // Jumps, calls and returns
            // ----------------------------------------------------------
            0x5F => self.regs.pc = self.fetch16(bus),
            0x1F => {
                let pointer = self.addr_abs_x(bus);
                self.regs.pc = read16(bus, pointer);
            }
            0x3F => {
                let target = self.fetch16(bus);
                self.call(bus, target);
            }
            0x4F => {
                let target = 0xFF00 | u16::from(self.fetch(bus));
                self.call(bus, target);
            }
            0x6F => self.regs.pc = self.pull16(bus),
            0x7F => {
                self.regs.psw = self.pull(bus);
                self.regs.pc = self.pull16(bus);
            }
            0x0F => {
                self.push16(bus, self.regs.pc);
                self.push(bus, self.regs.psw);
                self.regs.set_flag(flags::B, true);
                self.regs.set_flag(I, false);
                self.regs.pc = read16(bus, 0xFFDE);
            }

            // Stack
            0x0D => self.push(bus, self.regs.psw),
            0x2D => self.push(bus, self.regs.a),
            0x4D => self.push(bus, self.regs.x),
            0x6D => self.push(bus, self.regs.y),
            0x8E => self.regs.psw = self.pull(bus),
            0xAE => self.regs.a = self.pull(bus),
            0xCE => self.regs.x = self.pull(bus),
            0xEE => self.regs.y = self.pull(bus),

            0xED => {
                let carry = self.regs.flag(C);
                self.regs.set_flag(C, !carry);
            }

            0xEF | 0xFF => {
                log::debug!(
                    "SPC700 halted by {} at ${:04X}",
                    if opcode == 0xEF { "SLEEP" } else { "STOP" },
                    self.regs.pc.wrapping_sub(1)
                );
                self.state = State::Halted;
            }
        }
        u32::from(CYCLES[usize::from(opcode)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{Cpu, SimpleBus};

    fn run(program: &[u8], setup: impl FnOnce(&mut Spc700, &mut SimpleBus)) -> (Spc700, SimpleBus) {
        let mut bus = SimpleBus::with_size(0x1_0000);
        let mut cpu = Spc700::new();
        bus.load(0x0200, program);
        cpu.regs.pc = 0x0200;
        setup(&mut cpu, &mut bus);
        cpu.step(&mut bus);
        (cpu, bus)
    }

    #[test]
    fn alu_rows_map_to_operations() {
        assert_eq!(alu_for(0x04), Alu::Or);
        assert_eq!(alu_for(0x35), Alu::And);
        assert_eq!(alu_for(0x48), Alu::Eor);
        assert_eq!(alu_for(0x78), Alu::Cmp);
        assert_eq!(alu_for(0x89), Alu::Adc);
        assert_eq!(alu_for(0xB7), Alu::Sbc);
    }

    #[test]
    fn cmp_memory_does_not_store() {
        // CMP $10,#$20
        let (cpu, bus) = run(&[0x78, 0x20, 0x10], |_, bus| bus.write(0x10, 0x20));
        assert_eq!(bus.peek(0x10), 0x20);
        assert!(cpu.regs.flag(Z));
        assert!(cpu.regs.flag(C));
    }

    #[test]
    fn mul_sets_flags_from_y() {
        let (cpu, _) = run(&[0xCF], |cpu, _| {
            cpu.regs.y = 0x10;
            cpu.regs.a = 0x10;
        });
        assert_eq!(cpu.regs.ya(), 0x0100);
        assert!(!cpu.regs.flag(Z));
        assert!(!cpu.regs.flag(N));
    }

    #[test]
    fn div_normal_and_overflow() {
        let (cpu, _) = run(&[0x9E], |cpu, _| {
            cpu.regs.set_ya(1000);
            cpu.regs.x = 7;
        });
        assert_eq!(cpu.regs.a, 142);
        assert_eq!(cpu.regs.y, 6);
        assert!(!cpu.regs.flag(V));

        let (cpu, _) = run(&[0x9E], |cpu, _| {
            cpu.regs.set_ya(0x1234);
            cpu.regs.x = 0;
        });
        assert!(cpu.regs.flag(V), "dividing by zero overflows");
        assert_eq!(cpu.regs.a, 0xFF - 0x12);
        assert_eq!(cpu.regs.y, 0x34);
    }

    #[test]
    fn daa_adjusts_after_binary_add() {
        // 0x19 + 0x03 = 0x1C with H clear; DAA gives 0x22
        let (cpu, _) = run(&[0xDF], |cpu, _| cpu.regs.a = 0x1C);
        assert_eq!(cpu.regs.a, 0x22);
        assert!(!cpu.regs.flag(C));
    }

    #[test]
    fn xcn_swaps_nibbles() {
        let (cpu, _) = run(&[0x9F], |cpu, _| cpu.regs.a = 0x3C);
        assert_eq!(cpu.regs.a, 0xC3);
        assert!(cpu.regs.flag(N));
    }

    #[test]
    fn addw_subw() {
        let (cpu, _) = run(&[0x7A, 0x20], |cpu, bus| {
            cpu.regs.set_ya(0x7FFF);
            bus.load(0x20, &[0x01, 0x00]);
        });
        assert_eq!(cpu.regs.ya(), 0x8000);
        assert!(cpu.regs.flag(V));
        assert!(cpu.regs.flag(H));
        assert!(!cpu.regs.flag(C));

        let (cpu, _) = run(&[0x9A, 0x20], |cpu, bus| {
            cpu.regs.set_ya(0x0000);
            bus.load(0x20, &[0x01, 0x00]);
        });
        assert_eq!(cpu.regs.ya(), 0xFFFF);
        assert!(!cpu.regs.flag(C), "borrow clears carry");
        assert!(cpu.regs.flag(N));
    }

    #[test]
    fn mem_bit_ops() {
        // MOV1 C,$0123.5
        let operand: u16 = 0x0123 | (5 << 13);
        let [lo, hi] = operand.to_le_bytes();
        let (cpu, _) = run(&[0xAA, lo, hi], |_, bus| bus.write(0x0123, 0x20));
        assert!(cpu.regs.flag(C));

        // NOT1 $0123.5
        let (_, bus) = run(&[0xEA, lo, hi], |_, bus| bus.write(0x0123, 0x21));
        assert_eq!(bus.peek(0x0123), 0x01);

        // AND1 C,/$0123.5 with the bit set leaves carry clear
        let (cpu, _) = run(&[0x6A, lo, hi], |cpu, bus| {
            cpu.regs.set_flag(C, true);
            bus.write(0x0123, 0x20);
        });
        assert!(!cpu.regs.flag(C));
    }

    #[test]
    fn tset1_and_tclr1() {
        let (cpu, bus) = run(&[0x0E, 0x00, 0x03], |cpu, bus| {
            cpu.regs.a = 0x0F;
            bus.write(0x0300, 0xF0);
        });
        assert_eq!(bus.peek(0x0300), 0xFF);
        assert!(!cpu.regs.flag(Z));

        let (_, bus) = run(&[0x4E, 0x00, 0x03], |cpu, bus| {
            cpu.regs.a = 0x0F;
            bus.write(0x0300, 0xFF);
        });
        assert_eq!(bus.peek(0x0300), 0xF0);
    }

    #[test]
    fn direct_page_follows_p_flag() {
        // MOV A,$10 with P set reads $0110
        let (cpu, _) = run(&[0xE4, 0x10], |cpu, bus| {
            cpu.regs.set_flag(P, true);
            bus.write(0x0010, 0x11);
            bus.write(0x0110, 0x22);
        });
        assert_eq!(cpu.regs.a, 0x22);
    }

    #[test]
    fn taken_branch_costs_two_more_cycles() {
        let mut bus = SimpleBus::with_size(0x1_0000);
        let mut cpu = Spc700::new();
        bus.load(0x0200, &[0x2F, 0x10]);
        cpu.regs.pc = 0x0200;
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.regs.pc, 0x0212);
    }
}
