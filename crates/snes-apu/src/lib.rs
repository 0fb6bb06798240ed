//! SNES audio processing unit.
//!
//! The APU is a self-contained computer: an SPC700 running at 1.024 MHz,
//! 64 KB of audio RAM, three timers, the S-DSP and four mailbox ports that
//! are the only link to the main CPU. At power-on the 64-byte IPL ROM at
//! $FFC0 waits for the host to upload a sound driver through the ports.
//!
//! [`Apu::cycle`] runs one SPC700 instruction, then advances the timers and
//! the DSP by the cycles it took. The DSP produces one stereo sample every
//! 32 cycles into its frame ring buffer.

mod bus;
mod timer;

use emu_core::{Bus, Cpu, Observable, Value};
use sony_dsp::{Aram, CYCLES_PER_SAMPLE, Dsp};
use sony_spc700::Spc700;

pub use bus::{ApuBus, IoState};
pub use timer::Timer;

/// APU clock in Hz.
pub const APU_CLOCK_HZ: u32 = 1_024_000;

/// Boot ROM mapped at $FFC0-$FFFF while $F1 bit 7 is clear.
pub const IPL_ROM: [u8; 64] = [
    0xCD, 0xEF, 0xBD, 0xE8, 0x00, 0xC6, 0x1D, 0xD0, 0xFC, 0x8F, 0xAA, 0xF4, 0x8F, 0xBB, 0xF5, 0x78,
    0xCC, 0xF4, 0xD0, 0xFB, 0x2F, 0x19, 0xEB, 0xF4, 0xD0, 0xFC, 0x7E, 0xF4, 0xD0, 0x0B, 0xE4, 0xF5,
    0xCB, 0xF4, 0xD7, 0x00, 0xFC, 0xD0, 0xF3, 0xAB, 0x01, 0x10, 0xEF, 0x7E, 0xF4, 0x10, 0xEB, 0xBA,
    0xF6, 0xDA, 0x00, 0xBA, 0xF4, 0xC4, 0xF4, 0xDD, 0x5D, 0xD0, 0xDB, 0x1F, 0x00, 0x00, 0xC0, 0xFF,
];

/// Debug snapshot of the APU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApuStatus {
    pub pc: u16,
    pub cycles: u64,
    pub ipl_enabled: bool,
    pub in_ports: [u8; 4],
    pub out_ports: [u8; 4],
    pub timers: [Timer; 3],
    pub dsp_sample_offset: u32,
    pub dsp_frame_boundary: u32,
}

pub struct Apu {
    spc: Spc700,
    ram: Box<Aram>,
    dsp: Dsp,
    io: IoState,
    /// APU cycles since reset.
    cycles: u64,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    /// A freshly reset APU with the IPL ROM mapped.
    #[must_use]
    pub fn new() -> Self {
        let mut apu = Self {
            spc: Spc700::new(),
            ram: Box::new([0; 0x10000]),
            dsp: Dsp::new(),
            io: IoState::new(),
            cycles: 0,
        };
        apu.reset();
        apu
    }

    /// Power-on reset: clear ARAM, map the IPL ROM and start the SPC700 at
    /// its reset vector.
    pub fn reset(&mut self) {
        let log_ports = self.io.log_ports;
        self.ram.fill(0);
        self.dsp.reset();
        self.io = IoState::new();
        self.io.log_ports = log_ports;
        self.cycles = 0;
        let mut bus = ApuBus {
            ram: &mut self.ram,
            dsp: &mut self.dsp,
            io: &mut self.io,
        };
        self.spc.reset_from_vector(&mut bus);
        log::debug!("apu: reset, PC=${:04X}", self.spc.regs.pc);
    }

    /// Log every value the SPC700 writes to its output ports.
    pub fn set_port_logging(&mut self, enabled: bool) {
        self.io.log_ports = enabled;
    }

    /// Run one SPC700 instruction and clock the timers and DSP for the
    /// cycles it took. Returns the cycle count.
    pub fn cycle(&mut self) -> u32 {
        let mut bus = ApuBus {
            ram: &mut self.ram,
            dsp: &mut self.dsp,
            io: &mut self.io,
        };
        let spent = self.spc.step(&mut bus);
        for _ in 0..spent {
            if self.cycles % u64::from(CYCLES_PER_SAMPLE) == 0 {
                self.dsp.cycle(&mut self.ram);
            }
            self.io.tick_timers();
            self.cycles += 1;
        }
        spent
    }

    /// Run whole instructions until at least `cycles` APU cycles have
    /// passed. Returns the cycles actually run, which may overshoot by
    /// part of an instruction.
    pub fn run_cycles(&mut self, cycles: u64) -> u64 {
        let start = self.cycles;
        let target = start + cycles;
        while self.cycles < target {
            self.cycle();
        }
        self.cycles - start
    }

    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.spc.regs.pc
    }

    #[must_use]
    pub const fn spc(&self) -> &Spc700 {
        &self.spc
    }

    #[must_use]
    pub const fn dsp(&self) -> &Dsp {
        &self.dsp
    }

    pub fn dsp_mut(&mut self) -> &mut Dsp {
        &mut self.dsp
    }

    #[must_use]
    pub fn ram(&self) -> &Aram {
        &self.ram
    }

    #[must_use]
    pub const fn ipl_enabled(&self) -> bool {
        self.io.ipl_enabled
    }

    /// Host write to port `port` ($2140-$2143 on the CPU side).
    pub fn write_port(&mut self, port: usize, value: u8) {
        self.io.in_ports[port & 3] = value;
    }

    /// Host read of port `port`: the SPC700's last write to $F4+port.
    #[must_use]
    pub fn read_port(&self, port: usize) -> u8 {
        self.io.out_ports[port & 3]
    }

    #[must_use]
    pub const fn in_ports(&self) -> [u8; 4] {
        self.io.in_ports
    }

    #[must_use]
    pub const fn out_ports(&self) -> [u8; 4] {
        self.io.out_ports
    }

    /// Write a DSP register directly, bypassing $F2/$F3.
    pub fn write_to_dsp(&mut self, addr: u8, value: u8) {
        self.dsp.write(addr, value);
    }

    #[must_use]
    pub fn read_dsp(&self, addr: u8) -> u8 {
        self.dsp.read(addr)
    }

    /// Copy `data` into ARAM at `addr`, wrapping at $FFFF.
    pub fn upload(&mut self, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.ram[usize::from(addr.wrapping_add(i as u16))] = byte;
        }
    }

    /// Start an already uploaded driver at `entry` without the IPL
    /// handshake. The IPL ROM is unmapped and the ports are cleared.
    pub fn bootstrap_direct(&mut self, entry: u16) {
        self.ram[0xF1] = 0x80;
        self.io.ipl_enabled = false;
        Cpu::reset(&mut self.spc);
        self.spc.regs.pc = entry;
        self.io.in_ports = [0; 4];
        self.io.out_ports = [0; 4];
        log::info!("apu: driver started at ${entry:04X}");
    }

    /// Read a byte as the SPC700 would, without side effects on I/O.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0xFFC0..=0xFFFF if self.io.ipl_enabled => IPL_ROM[usize::from(addr - 0xFFC0)],
            _ => self.ram[usize::from(addr)],
        }
    }

    /// Write a byte through the SPC700's bus, with I/O side effects.
    pub fn poke(&mut self, addr: u16, value: u8) {
        let mut bus = ApuBus {
            ram: &mut self.ram,
            dsp: &mut self.dsp,
            io: &mut self.io,
        };
        bus.write(u32::from(addr), value);
    }

    #[must_use]
    pub fn status(&self) -> ApuStatus {
        ApuStatus {
            pc: self.spc.regs.pc,
            cycles: self.cycles,
            ipl_enabled: self.io.ipl_enabled,
            in_ports: self.io.in_ports,
            out_ports: self.io.out_ports,
            timers: self.io.timers,
            dsp_sample_offset: self.dsp.sample_offset(),
            dsp_frame_boundary: self.dsp.frame_boundary(),
        }
    }
}

impl Observable for Apu {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("spc.") {
            return self.spc.query(rest);
        }
        match path {
            "cycles" => Some(self.cycles.into()),
            "ipl" => Some(self.io.ipl_enabled.into()),
            "dsp.addr" => Some(self.io.dsp_addr.into()),
            "dsp.samples" => Some(self.dsp.sample_offset().into()),
            _ => {
                let index = path.chars().last()?.to_digit(10)? as usize;
                let prefix = &path[..path.len() - 1];
                match prefix {
                    "in" if index < 4 => Some(self.io.in_ports[index].into()),
                    "out" if index < 4 => Some(self.io.out_ports[index].into()),
                    "timer" if index < 3 => Some(self.io.timers[index].counter().into()),
                    _ => None,
                }
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cycles", "ipl", "dsp.addr", "dsp.samples", "in0", "in1", "in2", "in3", "out0",
            "out1", "out2", "out3", "timer0", "timer1", "timer2", "spc.pc", "spc.a", "spc.x",
            "spc.y", "spc.sp", "spc.psw",
        ]
    }
}
