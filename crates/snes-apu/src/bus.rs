//! The SPC700's view of the APU address space.
//!
//! | Range | Contents |
//! |-------|----------|
//! | $00F0 | Test register (write ignored, reads 0) |
//! | $00F1 | Control: timer enables, port clears, bit 7 unmaps the IPL ROM |
//! | $00F2/$00F3 | DSP address / data |
//! | $00F4-$00F7 | Mailbox: reads see the host, writes go to the host |
//! | $00FA-$00FC | Timer targets |
//! | $00FD-$00FF | Timer counters (cleared on read) |
//! | $FFC0-$FFFF | IPL ROM while enabled, ARAM otherwise |
//!
//! Every write also lands in ARAM underneath.

use emu_core::Bus;
use sony_dsp::{Aram, Dsp};

use crate::IPL_ROM;
use crate::timer::Timer;

/// Registers shared between the SPC700 bus view and the host side.
#[derive(Debug, Clone)]
pub struct IoState {
    pub timers: [Timer; 3],
    /// Written by the host, read by the SPC700 at $F4-$F7.
    pub in_ports: [u8; 4],
    /// Written by the SPC700, read by the host.
    pub out_ports: [u8; 4],
    pub dsp_addr: u8,
    pub ipl_enabled: bool,
    /// Log SPC-side port writes.
    pub log_ports: bool,
}

impl Default for IoState {
    fn default() -> Self {
        Self::new()
    }
}

impl IoState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: [Timer::new(128), Timer::new(128), Timer::new(16)],
            in_ports: [0; 4],
            out_ports: [0; 4],
            dsp_addr: 0,
            ipl_enabled: true,
            log_ports: false,
        }
    }

    /// Advance the timers by one APU cycle.
    pub fn tick_timers(&mut self) {
        for timer in &mut self.timers {
            timer.tick();
        }
    }

    fn write_control(&mut self, value: u8) {
        for (i, timer) in self.timers.iter_mut().enumerate() {
            timer.set_enabled(value & (1 << i) != 0);
        }
        if value & 0x10 != 0 {
            self.in_ports[0] = 0;
            self.in_ports[1] = 0;
        }
        if value & 0x20 != 0 {
            self.in_ports[2] = 0;
            self.in_ports[3] = 0;
        }
        let ipl_enabled = value & 0x80 == 0;
        if ipl_enabled != self.ipl_enabled {
            log::debug!(
                "apu: IPL ROM {}",
                if ipl_enabled { "mapped" } else { "unmapped" }
            );
        }
        self.ipl_enabled = ipl_enabled;
    }
}

/// Split borrow of the APU handed to the SPC700 for one instruction.
pub struct ApuBus<'a> {
    pub ram: &'a mut Aram,
    pub dsp: &'a mut Dsp,
    pub io: &'a mut IoState,
}

impl Bus for ApuBus<'_> {
    fn read(&mut self, address: u32) -> u8 {
        let addr = address as u16;
        match addr {
            0x00F0 | 0x00F1 | 0x00FA..=0x00FC => 0,
            0x00F2 => self.io.dsp_addr,
            0x00F3 => self.dsp.read(self.io.dsp_addr),
            0x00F4..=0x00F7 => self.io.in_ports[usize::from(addr - 0x00F4)],
            0x00FD..=0x00FF => self.io.timers[usize::from(addr - 0x00FD)].read_counter(),
            0xFFC0..=0xFFFF if self.io.ipl_enabled => IPL_ROM[usize::from(addr - 0xFFC0)],
            _ => self.ram[usize::from(addr)],
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        let addr = address as u16;
        match addr {
            0x00F1 => self.io.write_control(value),
            0x00F2 => self.io.dsp_addr = value,
            0x00F3 => self.dsp.write(self.io.dsp_addr, value),
            0x00F4..=0x00F7 => {
                let port = usize::from(addr - 0x00F4);
                if self.io.log_ports && self.io.out_ports[port] != value {
                    log::debug!("apu: SPC wrote port {port} = ${value:02X}");
                }
                self.io.out_ports[port] = value;
            }
            0x00FA..=0x00FC => self.io.timers[usize::from(addr - 0x00FA)].target = value,
            _ => {}
        }
        self.ram[usize::from(addr)] = value;
    }
}
