//! WDC 65C816 CPU core.
//!
//! Instruction-stepped: each [`Cpu::step`] executes one whole instruction
//! and returns an approximate cycle count (base timing plus one cycle per
//! extra 16-bit data byte and one for an unaligned direct page).
//!
//! The register file models both emulation mode (E=1, 6502-compatible,
//! everything 8-bit, stack in page 1) and native mode, where M and X pick
//! the accumulator and index widths independently.

mod addressing;
mod alu;
mod execute;
pub mod flags;
mod registers;

use emu_core::{Bus, Cpu, Observable, Value};

pub use addressing::Mode;
pub use flags::Status;
pub use registers::Registers;

use flags::{C, D, I, M, N, V, X, Z};

/// Interrupt vectors in bank 0.
mod vectors {
    pub const NATIVE_COP: u32 = 0xFFE4;
    pub const NATIVE_BRK: u32 = 0xFFE6;
    pub const NATIVE_NMI: u32 = 0xFFEA;
    pub const NATIVE_IRQ: u32 = 0xFFEE;
    pub const EMULATION_COP: u32 = 0xFFF4;
    pub const EMULATION_NMI: u32 = 0xFFFA;
    pub const RESET: u32 = 0xFFFC;
    pub const EMULATION_IRQ_BRK: u32 = 0xFFFE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// WAI: idle until an interrupt is requested.
    Waiting,
    /// STP: idle until reset.
    Stopped,
}

/// Which interrupt sequence to run.
#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Brk,
    Cop,
    Irq,
    Nmi,
}

/// The 65C816 CPU.
#[derive(Debug)]
pub struct Wdc65816 {
    pub regs: Registers,
    state: State,
    nmi_pending: bool,
    irq_pending: bool,
    /// Cycles added by the current instruction on top of its base timing.
    extra_cycles: u32,
    total_cycles: u64,
    /// Log every executed instruction at trace level.
    trace: bool,
}

impl Default for Wdc65816 {
    fn default() -> Self {
        Self::new()
    }
}

impl Wdc65816 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            state: State::Running,
            nmi_pending: false,
            irq_pending: false,
            extra_cycles: 0,
            total_cycles: 0,
            trace: false,
        }
    }

    /// Enable or disable per-instruction trace logging.
    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    /// Load PC from the reset vector. Call after [`Cpu::reset`] once the bus
    /// has a ROM mapped.
    pub fn load_reset_vector<B: Bus>(&mut self, bus: &mut B) {
        self.regs.pb = 0;
        self.regs.pc = bus.read_word(vectors::RESET);
    }

    /// Total cycles executed since power-on.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// True while parked in WAI.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.state == State::Waiting
    }

    /// Run the interrupt entry sequence and return its cycle cost.
    fn enter_interrupt<B: Bus>(&mut self, bus: &mut B, kind: Interrupt) -> u32 {
        let emulation = self.regs.e;
        if !emulation {
            self.push8(bus, self.regs.pb);
        }
        self.push16(bus, self.regs.pc);
        let pushed = match kind {
            Interrupt::Brk if emulation => self.regs.p.0 | flags::B,
            Interrupt::Irq | Interrupt::Nmi if emulation => self.regs.p.0 & !flags::B,
            _ => self.regs.p.0,
        };
        self.push8(bus, pushed);
        self.regs.p.set(I);
        self.regs.p.clear(D);
        self.regs.pb = 0;

        let vector = match (kind, emulation) {
            (Interrupt::Brk, false) => vectors::NATIVE_BRK,
            (Interrupt::Cop, false) => vectors::NATIVE_COP,
            (Interrupt::Irq, false) => vectors::NATIVE_IRQ,
            (Interrupt::Nmi, false) => vectors::NATIVE_NMI,
            (Interrupt::Cop, true) => vectors::EMULATION_COP,
            (Interrupt::Nmi, true) => vectors::EMULATION_NMI,
            (Interrupt::Brk | Interrupt::Irq, true) => vectors::EMULATION_IRQ_BRK,
        };
        self.regs.pc = bus.read_word(vector);
        if emulation { 7 } else { 8 }
    }

    /// Execute the instruction at PC and return the cycles it took.
    ///
    /// This is the `ExecuteInstruction` entry point: operands are fetched,
    /// the addressing mode resolved, flags updated and PC left at the next
    /// instruction.
    pub fn execute_instruction<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let pc = self.regs.pc_long();
        let opcode = self.fetch8(bus);
        if self.trace {
            log::trace!(
                "{pc:06X} {opcode:02X} A:{:04X} X:{:04X} Y:{:04X} S:{:04X} D:{:04X} DB:{:02X} P:{:02X} E:{}",
                self.regs.a,
                self.regs.x,
                self.regs.y,
                self.regs.s,
                self.regs.d,
                self.regs.db,
                self.regs.p.0,
                u8::from(self.regs.e)
            );
        }
        self.extra_cycles = 0;
        let base = self.execute(bus, opcode);
        base + self.extra_cycles
    }
}

impl Cpu for Wdc65816 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let cycles = if self.nmi_pending && self.state != State::Stopped {
            self.nmi_pending = false;
            self.state = State::Running;
            self.enter_interrupt(bus, Interrupt::Nmi)
        } else if self.irq_pending && self.state != State::Stopped {
            self.irq_pending = false;
            self.state = State::Running;
            if self.regs.p.is_set(I) {
                // WAI with IRQs masked resumes without taking the interrupt.
                1
            } else {
                self.enter_interrupt(bus, Interrupt::Irq)
            }
        } else if self.state == State::Running {
            self.execute_instruction(bus)
        } else {
            1
        };
        self.total_cycles += u64::from(cycles);
        cycles
    }

    fn pc(&self) -> u32 {
        self.regs.pc_long()
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.state == State::Stopped
    }

    fn interrupt(&mut self) -> bool {
        if self.regs.p.is_set(I) && self.state != State::Waiting {
            return false;
        }
        self.irq_pending = true;
        true
    }

    fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    fn reset(&mut self) {
        self.regs = Registers::new();
        self.state = State::Running;
        self.nmi_pending = false;
        self.irq_pending = false;
        self.extra_cycles = 0;
    }
}

impl Observable for Wdc65816 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc_long().into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "d" => Some(self.regs.d.into()),
            "db" => Some(self.regs.db.into()),
            "pb" => Some(self.regs.pb.into()),
            "p" | "status" => Some(self.regs.p.0.into()),
            "e" => Some(self.regs.e.into()),
            "flags.c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" => Some(self.regs.p.is_set(D).into()),
            "flags.x" => Some(self.regs.p.is_set(X).into()),
            "flags.m" => Some(self.regs.p.is_set(M).into()),
            "flags.v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" => Some(self.regs.p.is_set(N).into()),
            "cycles" => Some(self.total_cycles.into()),
            "halted" => Some(self.is_halted().into()),
            "waiting" => Some(self.is_waiting().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "s", "d", "db", "pb", "p", "e", "flags.c", "flags.z", "flags.i",
            "flags.d", "flags.x", "flags.m", "flags.v", "flags.n", "cycles", "halted", "waiting",
        ]
    }
}
