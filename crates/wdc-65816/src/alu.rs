//! Arithmetic, logic and shift operations.
//!
//! Everything computes in the active width and takes N/Z from that width's
//! masks. In 8-bit accumulator mode the hidden high byte of A is preserved.

use crate::Wdc65816;
use crate::flags::{C, D, N, V, Z};

/// Decimal add of `digits` BCD nibbles. `operand` is already inverted for
/// subtraction. Returns the result and carry out.
fn bcd_add(a: u16, operand: u16, carry: bool, subtract: bool, digits: u32) -> (u16, bool) {
    let mut result = 0u16;
    let mut carry = carry;
    for i in 0..digits {
        let shift = i * 4;
        let mut digit =
            i32::from((a >> shift) & 0xF) + i32::from((operand >> shift) & 0xF) + i32::from(carry);
        if subtract {
            if digit <= 0x0F {
                digit -= 6;
            }
        } else if digit > 0x09 {
            digit += 6;
        }
        carry = digit > 0x0F;
        result |= ((digit & 0x0F) as u16) << shift;
    }
    (result, carry)
}

impl Wdc65816 {
    fn m_wide(&self) -> bool {
        self.regs.accumulator_is_wide()
    }

    /// Replace the active-width part of A.
    fn set_a(&mut self, value: u16) {
        if self.m_wide() {
            self.regs.a = value;
        } else {
            self.regs.a = (self.regs.a & 0xFF00) | (value & 0x00FF);
        }
    }

    fn a_active(&self) -> u16 {
        if self.m_wide() { self.regs.a } else { self.regs.a & 0x00FF }
    }

    /// Shared ADC/SBC core. `operand` is pre-inverted for SBC.
    fn add_with_carry(&mut self, operand: u16, subtract: bool) {
        let wide = self.m_wide();
        let (mask, sign, digits) = if wide { (0xFFFF_u32, 0x8000_u32, 4) } else { (0xFF, 0x80, 2) };
        let a = u32::from(self.a_active());
        let operand = u32::from(operand) & mask;
        let carry_in = self.regs.p.is_set(C);

        let (result, carry_out) = if self.regs.p.is_set(D) {
            let (r, c) = bcd_add(a as u16, operand as u16, carry_in, subtract, digits);
            (u32::from(r), c)
        } else {
            let sum = a + operand + u32::from(carry_in);
            (sum & mask, sum > mask)
        };

        let overflow = !(a ^ operand) & (a ^ result) & sign != 0;
        self.regs.p.set_if(V, overflow);
        self.regs.p.set_if(C, carry_out);
        self.regs.p.update_nz(result as u16, wide);
        self.set_a(result as u16);
    }

    pub(crate) fn adc(&mut self, operand: u16) {
        self.add_with_carry(operand, false);
    }

    pub(crate) fn sbc(&mut self, operand: u16) {
        self.add_with_carry(!operand, true);
    }

    pub(crate) fn and(&mut self, operand: u16) {
        let result = self.a_active() & operand;
        self.regs.p.update_nz(result, self.m_wide());
        self.set_a(result);
    }

    pub(crate) fn ora(&mut self, operand: u16) {
        let result = self.a_active() | operand;
        self.regs.p.update_nz(result, self.m_wide());
        self.set_a(result);
    }

    pub(crate) fn eor(&mut self, operand: u16) {
        let result = self.a_active() ^ operand;
        self.regs.p.update_nz(result, self.m_wide());
        self.set_a(result);
    }

    pub(crate) fn lda(&mut self, operand: u16) {
        self.regs.p.update_nz(operand, self.m_wide());
        self.set_a(operand);
    }

    pub(crate) fn ldx(&mut self, operand: u16) {
        let wide = self.regs.index_is_wide();
        self.regs.x = if wide { operand } else { operand & 0xFF };
        self.regs.p.update_nz(operand, wide);
    }

    pub(crate) fn ldy(&mut self, operand: u16) {
        let wide = self.regs.index_is_wide();
        self.regs.y = if wide { operand } else { operand & 0xFF };
        self.regs.p.update_nz(operand, wide);
    }

    fn compare(&mut self, register: u16, operand: u16, wide: bool) {
        let mask = if wide { 0xFFFF } else { 0x00FF };
        let register = register & mask;
        let operand = operand & mask;
        self.regs.p.set_if(C, register >= operand);
        self.regs.p.update_nz(register.wrapping_sub(operand), wide);
    }

    pub(crate) fn cmp(&mut self, operand: u16) {
        self.compare(self.regs.a, operand, self.m_wide());
    }

    pub(crate) fn cpx(&mut self, operand: u16) {
        self.compare(self.regs.x, operand, self.regs.index_is_wide());
    }

    pub(crate) fn cpy(&mut self, operand: u16) {
        self.compare(self.regs.y, operand, self.regs.index_is_wide());
    }

    /// BIT from memory: N and V come from the operand's top bits.
    pub(crate) fn bit(&mut self, operand: u16) {
        let wide = self.m_wide();
        let sign = if wide { 0x8000 } else { 0x80 };
        self.regs.p.set_if(N, operand & sign != 0);
        self.regs.p.set_if(V, operand & (sign >> 1) != 0);
        self.bit_immediate(operand);
    }

    /// BIT #imm only touches Z.
    pub(crate) fn bit_immediate(&mut self, operand: u16) {
        self.regs.p.set_if(Z, self.a_active() & operand == 0);
    }

    // ------------------------------------------------------------------
    // Read-modify-write (memory or accumulator)
    // ------------------------------------------------------------------

    pub(crate) fn asl(&mut self, value: u16) -> u16 {
        let wide = self.m_wide();
        let sign = if wide { 0x8000 } else { 0x80 };
        self.regs.p.set_if(C, value & sign != 0);
        let result = value << 1;
        self.regs.p.update_nz(result, wide);
        result
    }

    pub(crate) fn lsr(&mut self, value: u16) -> u16 {
        let wide = self.m_wide();
        let value = if wide { value } else { value & 0xFF };
        self.regs.p.set_if(C, value & 1 != 0);
        let result = value >> 1;
        self.regs.p.update_nz(result, wide);
        result
    }

    pub(crate) fn rol(&mut self, value: u16) -> u16 {
        let wide = self.m_wide();
        let sign = if wide { 0x8000 } else { 0x80 };
        let carry_in = u16::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, value & sign != 0);
        let result = (value << 1) | carry_in;
        self.regs.p.update_nz(result, wide);
        result
    }

    pub(crate) fn ror(&mut self, value: u16) -> u16 {
        let wide = self.m_wide();
        let value = if wide { value } else { value & 0xFF };
        let top = if wide { 0x8000 } else { 0x80 };
        let carry_in = if self.regs.p.is_set(C) { top } else { 0 };
        self.regs.p.set_if(C, value & 1 != 0);
        let result = (value >> 1) | carry_in;
        self.regs.p.update_nz(result, wide);
        result
    }

    pub(crate) fn inc(&mut self, value: u16) -> u16 {
        let result = value.wrapping_add(1);
        self.regs.p.update_nz(result, self.m_wide());
        result
    }

    pub(crate) fn dec(&mut self, value: u16) -> u16 {
        let result = value.wrapping_sub(1);
        self.regs.p.update_nz(result, self.m_wide());
        result
    }

    /// Test and set bits: Z from A & value, then value |= A.
    pub(crate) fn tsb(&mut self, value: u16) -> u16 {
        let a = self.a_active();
        self.regs.p.set_if(Z, a & value & self.width_mask() == 0);
        value | a
    }

    /// Test and reset bits: Z from A & value, then value &= !A.
    pub(crate) fn trb(&mut self, value: u16) -> u16 {
        let a = self.a_active();
        self.regs.p.set_if(Z, a & value & self.width_mask() == 0);
        value & !a
    }

    fn width_mask(&self) -> u16 {
        if self.m_wide() { 0xFFFF } else { 0x00FF }
    }

    /// Apply a read-modify-write op to the accumulator.
    pub(crate) fn modify_a(&mut self, op: fn(&mut Self, u16) -> u16) {
        let value = self.a_active();
        let result = op(self, value);
        self.set_a(result);
    }
}
