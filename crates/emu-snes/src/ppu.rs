//! Video unit register shell.
//!
//! Pixels are not rendered. The shell keeps the $2100-$213F register file,
//! counts dots and scanlines on the master clock, and raises the two events
//! the rest of the system needs: start of VBlank and end of frame.
//!
//! One scanline is 1364 master cycles. Lines 1-224 are visible and go
//! through [`Ppu::render_scanline`]; VBlank starts at line 225.

use emu_core::{Tickable, Ticks};

use crate::config::{MASTER_CYCLES_PER_LINE, SnesRegion};

const DOTS_PER_LINE: u16 = MASTER_CYCLES_PER_LINE as u16;

/// Chip version reported in STAT77/STAT78.
const PPU1_VERSION: u8 = 0x01;
const PPU2_VERSION: u8 = 0x03;

pub struct Ppu {
    /// Last value written to each of $2100-$213F.
    regs: [u8; 0x40],
    /// Master cycle within the current line.
    dot: u16,
    line: u16,
    lines_per_frame: u16,
    vblank_line: u16,
    pal: bool,
    in_vblank: bool,
    vblank_event: bool,
    frame_event: bool,
    latched_h: u16,
    latched_v: u16,
    /// Flip-flops for the two-read OPHCT/OPVCT ports.
    h_high: bool,
    v_high: bool,
    counter_latched: bool,
    frames: u64,
    rendered_lines: u64,
}

impl Ppu {
    #[must_use]
    pub fn new(region: SnesRegion) -> Self {
        Self {
            regs: [0; 0x40],
            dot: 0,
            line: 0,
            lines_per_frame: region.scanlines_per_frame(),
            vblank_line: region.vblank_line(),
            pal: region == SnesRegion::Pal,
            in_vblank: false,
            vblank_event: false,
            frame_event: false,
            latched_h: 0,
            latched_v: 0,
            h_high: false,
            v_high: false,
            counter_latched: false,
            frames: 0,
            rendered_lines: 0,
        }
    }

    pub fn reset(&mut self) {
        let region = if self.pal {
            SnesRegion::Pal
        } else {
            SnesRegion::Ntsc
        };
        *self = Self::new(region);
    }

    /// CPU read from $2100-$213F (`addr` is the low byte).
    pub fn read(&mut self, addr: u8) -> u8 {
        match addr & 0x3F {
            0x37 => {
                self.latch_counters();
                0
            }
            0x3C => {
                let value = pick_byte(self.latched_h, self.h_high);
                self.h_high = !self.h_high;
                value
            }
            0x3D => {
                let value = pick_byte(self.latched_v, self.v_high);
                self.v_high = !self.v_high;
                value
            }
            0x3E => PPU1_VERSION,
            0x3F => {
                let field = self.frames & 1 != 0;
                let value = PPU2_VERSION
                    | (u8::from(field) << 7)
                    | (u8::from(self.counter_latched) << 6)
                    | (u8::from(self.pal) << 4);
                self.counter_latched = false;
                self.h_high = false;
                self.v_high = false;
                value
            }
            _ => 0,
        }
    }

    /// CPU write to $2100-$213F.
    pub fn write(&mut self, addr: u8, value: u8) {
        self.regs[usize::from(addr & 0x3F)] = value;
    }

    /// Last value written to $21xx.
    #[must_use]
    pub fn register(&self, addr: u8) -> u8 {
        self.regs[usize::from(addr & 0x3F)]
    }

    /// INIDISP bit 7.
    #[must_use]
    pub fn forced_blank(&self) -> bool {
        self.regs[0] & 0x80 != 0
    }

    fn latch_counters(&mut self) {
        // H counter runs in 4-master-cycle dots.
        self.latched_h = self.dot / 4;
        self.latched_v = self.line;
        self.counter_latched = true;
    }

    /// Process one visible line. The shell only counts it.
    pub fn render_scanline(&mut self, line: u16) {
        debug_assert!((1..self.vblank_line).contains(&line));
        self.rendered_lines += 1;
    }

    fn end_of_line(&mut self) {
        if (1..self.vblank_line).contains(&self.line) {
            self.render_scanline(self.line);
        }
        self.line += 1;
        if self.line == self.vblank_line {
            self.in_vblank = true;
            self.vblank_event = true;
        } else if self.line == self.lines_per_frame {
            self.line = 0;
            self.in_vblank = false;
            self.frames += 1;
            self.frame_event = true;
        }
    }

    /// Step to the end of the current frame. Returns the master cycles run.
    pub fn run_frame(&mut self) -> u64 {
        let lines_left = u64::from(self.lines_per_frame - self.line);
        let cycles = lines_left * MASTER_CYCLES_PER_LINE - u64::from(self.dot);
        self.tick_n(Ticks::new(cycles));
        cycles
    }

    /// Take the pending start-of-VBlank event.
    pub fn take_vblank(&mut self) -> bool {
        std::mem::take(&mut self.vblank_event)
    }

    /// Take the pending end-of-frame event.
    pub fn take_frame(&mut self) -> bool {
        std::mem::take(&mut self.frame_event)
    }

    #[must_use]
    pub const fn in_vblank(&self) -> bool {
        self.in_vblank
    }

    #[must_use]
    pub const fn scanline(&self) -> u16 {
        self.line
    }

    #[must_use]
    pub const fn dot(&self) -> u16 {
        self.dot
    }

    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub const fn rendered_lines(&self) -> u64 {
        self.rendered_lines
    }
}

fn pick_byte(value: u16, high: bool) -> u8 {
    if high {
        (value >> 8) as u8 & 0x01
    } else {
        value as u8
    }
}

impl Tickable for Ppu {
    fn tick(&mut self) {
        self.dot += 1;
        if self.dot == DOTS_PER_LINE {
            self.dot = 0;
            self.end_of_line();
        }
    }

    fn tick_n(&mut self, count: Ticks) {
        let mut remaining = count.get();
        while remaining > 0 {
            let to_line_end = u64::from(DOTS_PER_LINE - self.dot);
            if remaining < to_line_end {
                self.dot += remaining as u16;
                return;
            }
            remaining -= to_line_end;
            self.dot = 0;
            self.end_of_line();
        }
    }
}
