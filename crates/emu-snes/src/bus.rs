//! The 65816's view of the system (LoROM mapping).
//!
//! | Banks | Offset | Contents |
//! |-------|--------|----------|
//! | $00-$3F, $80-$BF | $0000-$1FFF | First 8 KB of WRAM |
//! | | $2100-$213F | Video registers |
//! | | $2140-$217F | APU ports 0-3, mirrored |
//! | | $2180-$2183 | WRAM data port and address |
//! | | $4200 | NMITIMEN |
//! | | $4210 | RDNMI (bit 7 clears on read) |
//! | | $4212 | HVBJOY |
//! | | $8000-$FFFF | ROM, 32 KB per bank |
//! | $40-$7D, $C0-$FF | $8000-$FFFF | ROM |
//! | $7E-$7F | all | 128 KB WRAM |
//!
//! Unmapped reads return 0. Writes to ROM are ignored.

use emu_core::Bus;
use snes_apu::Apu;

use crate::config::SnesRegion;
use crate::ppu::Ppu;

pub const WRAM_SIZE: usize = 0x2_0000;

/// CPU revision reported in the low nibble of RDNMI.
const CPU_VERSION: u8 = 0x02;

pub struct SnesBus {
    pub wram: Box<[u8; WRAM_SIZE]>,
    rom: Vec<u8>,
    pub ppu: Ppu,
    pub apu: Apu,
    /// $4200: bit 7 enables the VBlank NMI.
    nmitimen: u8,
    /// Latched VBlank NMI flag read through $4210.
    nmi_flag: bool,
    /// $2181-$2183 address for the $2180 data port.
    wram_port: u32,
}

impl SnesBus {
    #[must_use]
    pub fn new(rom: Vec<u8>, region: SnesRegion) -> Self {
        Self {
            wram: Box::new([0; WRAM_SIZE]),
            rom,
            ppu: Ppu::new(region),
            apu: Apu::new(),
            nmitimen: 0,
            nmi_flag: false,
            wram_port: 0,
        }
    }

    /// Power-on state for everything except ROM.
    pub fn reset(&mut self) {
        self.wram.fill(0);
        self.ppu.reset();
        self.apu.reset();
        self.nmitimen = 0;
        self.nmi_flag = false;
        self.wram_port = 0;
    }

    /// Swap in a new ROM image.
    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.rom = rom;
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// True when the VBlank NMI is enabled in $4200.
    #[must_use]
    pub const fn nmi_enabled(&self) -> bool {
        self.nmitimen & 0x80 != 0
    }

    /// Start of VBlank: latch the RDNMI flag. Returns true when the CPU
    /// should take an NMI.
    pub fn signal_vblank(&mut self) -> bool {
        self.nmi_flag = true;
        self.nmi_enabled()
    }

    /// WRAM byte by its 17-bit offset, no side effects.
    #[must_use]
    pub fn peek_wram(&self, offset: u32) -> u8 {
        self.wram[offset as usize % WRAM_SIZE]
    }

    fn rom_byte(&self, bank: u8, offset: u16) -> u8 {
        if self.rom.is_empty() {
            return 0;
        }
        let index = usize::from(bank & 0x7F) * 0x8000 + usize::from(offset - 0x8000);
        self.rom[index % self.rom.len()]
    }

    fn read_system(&mut self, offset: u16) -> u8 {
        match offset {
            0x0000..=0x1FFF => self.wram[usize::from(offset)],
            0x2100..=0x213F => self.ppu.read(offset as u8),
            0x2140..=0x217F => self.apu.read_port(usize::from(offset & 3)),
            0x2180 => {
                let value = self.wram[self.wram_port as usize];
                self.wram_port = (self.wram_port + 1) % WRAM_SIZE as u32;
                value
            }
            0x4210 => {
                let value = (u8::from(self.nmi_flag) << 7) | CPU_VERSION;
                self.nmi_flag = false;
                value
            }
            0x4212 => u8::from(self.ppu.in_vblank()) << 7,
            _ => 0,
        }
    }

    fn write_system(&mut self, offset: u16, value: u8) {
        match offset {
            0x0000..=0x1FFF => self.wram[usize::from(offset)] = value,
            0x2100..=0x213F => self.ppu.write(offset as u8, value),
            0x2140..=0x217F => self.apu.write_port(usize::from(offset & 3), value),
            0x2180 => {
                self.wram[self.wram_port as usize] = value;
                self.wram_port = (self.wram_port + 1) % WRAM_SIZE as u32;
            }
            0x2181 => self.wram_port = (self.wram_port & 0x1_FF00) | u32::from(value),
            0x2182 => self.wram_port = (self.wram_port & 0x1_00FF) | (u32::from(value) << 8),
            0x2183 => {
                self.wram_port = (self.wram_port & 0xFFFF) | (u32::from(value & 1) << 16);
            }
            0x4200 => self.nmitimen = value,
            _ => {}
        }
    }
}

impl Bus for SnesBus {
    fn read(&mut self, address: u32) -> u8 {
        let bank = (address >> 16) as u8;
        let offset = address as u16;
        match bank {
            0x7E | 0x7F => self.wram[(address & 0x1_FFFF) as usize],
            0x00..=0x3F | 0x80..=0xBF if offset < 0x8000 => self.read_system(offset),
            _ if offset >= 0x8000 => self.rom_byte(bank, offset),
            _ => 0,
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        let bank = (address >> 16) as u8;
        let offset = address as u16;
        match bank {
            0x7E | 0x7F => self.wram[(address & 0x1_FFFF) as usize] = value,
            0x00..=0x3F | 0x80..=0xBF if offset < 0x8000 => self.write_system(offset, value),
            _ => {}
        }
    }
}
