//! Sony SPC700 sound CPU core.
//!
//! The SPC700 runs the sound driver inside the SNES APU. It sees a flat
//! 64 KB address space; whoever implements [`Bus`] for it decides where
//! ARAM, the IPL ROM and the $F0-$FF I/O registers live. Addresses passed
//! to the bus are always 16-bit.
//!
//! Instruction-stepped like the 65816 core: [`Cpu::step`] runs one
//! instruction and returns its cycle count (two more for a taken branch).

mod execute;
pub mod flags;
mod registers;

use emu_core::{Bus, Cpu, Observable, Value};

pub use registers::Registers;

use flags::{B, C, H, I, N, P, V, Z};

/// Reset vector. TCALL 0 and BRK share $FFDE.
pub const RESET_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// SLEEP or STOP: nothing wakes the core short of a reset.
    Halted,
}

/// The SPC700.
#[derive(Debug)]
pub struct Spc700 {
    pub regs: Registers,
    state: State,
    /// Cycles added by the current instruction (taken branches).
    extra_cycles: u32,
    total_cycles: u64,
}

impl Default for Spc700 {
    fn default() -> Self {
        Self::new()
    }
}

impl Spc700 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            state: State::Running,
            extra_cycles: 0,
            total_cycles: 0,
        }
    }

    /// Reset and load PC from $FFFE.
    pub fn reset_from_vector<B: Bus>(&mut self, bus: &mut B) {
        Cpu::reset(self);
        self.regs.pc = read16(bus, RESET_VECTOR);
    }

    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    // ------------------------------------------------------------------
    // Memory helpers
    // ------------------------------------------------------------------

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(u32::from(self.regs.pc));
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Address of direct page offset `offset`.
    fn dp(&self, offset: u8) -> u16 {
        self.regs.direct_page() | u16::from(offset)
    }

    /// 16-bit word in the direct page. The high byte wraps inside the page.
    fn read_dp16<B: Bus>(&self, bus: &mut B, offset: u8) -> u16 {
        let lo = bus.read(u32::from(self.dp(offset)));
        let hi = bus.read(u32::from(self.dp(offset.wrapping_add(1))));
        u16::from_le_bytes([lo, hi])
    }

    fn write_dp16<B: Bus>(&self, bus: &mut B, offset: u8, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        bus.write(u32::from(self.dp(offset)), lo);
        bus.write(u32::from(self.dp(offset.wrapping_add(1))), hi);
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(0x0100 | u32::from(self.regs.sp), value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        bus.read(0x0100 | u32::from(self.regs.sp))
    }

    fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }
}

fn read16<B: Bus>(bus: &mut B, address: u16) -> u16 {
    let lo = bus.read(u32::from(address));
    let hi = bus.read(u32::from(address.wrapping_add(1)));
    u16::from_le_bytes([lo, hi])
}

impl Cpu for Spc700 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let cycles = if self.state == State::Running {
            let opcode = self.fetch(bus);
            self.extra_cycles = 0;
            self.execute(bus, opcode) + self.extra_cycles
        } else {
            2
        };
        self.total_cycles += u64::from(cycles);
        cycles
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    /// The APU has no interrupt sources.
    fn interrupt(&mut self) -> bool {
        false
    }

    fn nmi(&mut self) {}

    fn reset(&mut self) {
        self.regs = Registers::new();
        self.state = State::Running;
        self.extra_cycles = 0;
    }
}

impl Observable for Spc700 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "sp" => Some(self.regs.sp.into()),
            "ya" => Some(self.regs.ya().into()),
            "psw" => Some(self.regs.psw.into()),
            "flags.c" => Some(self.regs.flag(C).into()),
            "flags.z" => Some(self.regs.flag(Z).into()),
            "flags.i" => Some(self.regs.flag(I).into()),
            "flags.h" => Some(self.regs.flag(H).into()),
            "flags.b" => Some(self.regs.flag(B).into()),
            "flags.p" => Some(self.regs.flag(P).into()),
            "flags.v" => Some(self.regs.flag(V).into()),
            "flags.n" => Some(self.regs.flag(N).into()),
            "cycles" => Some(self.total_cycles.into()),
            "halted" => Some(self.is_halted().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "sp", "ya", "psw", "flags.c", "flags.z", "flags.i", "flags.h",
            "flags.b", "flags.p", "flags.v", "flags.n", "cycles", "halted",
        ]
    }
}
