//! Top-level SNES system.

use emu_core::{Bus, Clock, Cpu, Observable, Tickable, Ticks, Value};
use wdc_65816::Wdc65816;

use crate::bus::SnesBus;
use crate::config::{ExperimentFlags, SnesConfig, SnesRegion};
use crate::error::{MIN_ROM_SIZE, SnesError};

/// Master cycles per CPU cycle.
const CPU_DIVISOR: u64 = 8;

/// Wall time beyond this many frames is dropped rather than caught up.
const MAX_FRAMES_PER_RUN: f64 = 2.0;

/// SNES system.
pub struct Snes {
    cpu: Wdc65816,
    bus: SnesBus,
    region: SnesRegion,
    experiments: ExperimentFlags,
    /// Master cycles run by [`Snes::run_frame`].
    master_cycles: u64,
    /// Remainder of the master→APU conversion, in units of 1/denominator.
    apu_fraction: u64,
    /// APU cycles owed (negative when the last instruction overshot).
    apu_debt: i64,
    cpu_clock: Clock,
    apu_clock: Clock,
    video_clock: Clock,
    frame_count: u64,
    audio_frames: u64,
}

impl Snes {
    /// Build a system from `config` and reset it.
    pub fn new(config: &SnesConfig) -> Result<Self, SnesError> {
        validate_rom(&config.rom_data)?;
        let region = config.region;
        let mut snes = Self {
            cpu: Wdc65816::new(),
            bus: SnesBus::new(config.rom_data.clone(), region),
            region,
            experiments: config.experiments,
            master_cycles: 0,
            apu_fraction: 0,
            apu_debt: 0,
            cpu_clock: Clock::new(region.crystal_hz() as f64 / CPU_DIVISOR as f64),
            apu_clock: Clock::new(f64::from(
                sony_dsp::SAMPLE_RATE * sony_dsp::CYCLES_PER_SAMPLE,
            )),
            video_clock: Clock::new(region.field_rate()),
            frame_count: 0,
            audio_frames: 0,
        };
        snes.reset();
        log::info!(
            "snes: {:?}, {} KB ROM, reset vector ${:04X}",
            region,
            config.rom_data.len() / 1024,
            snes.cpu.regs.pc
        );
        Ok(snes)
    }

    /// Load a new ROM and reset CPU, video and APU.
    pub fn init(&mut self, rom: Vec<u8>) -> Result<(), SnesError> {
        validate_rom(&rom)?;
        self.bus.load_rom(rom);
        self.reset();
        Ok(())
    }

    /// Reset every unit and drop any accumulated time.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.bus.apu.set_port_logging(self.experiments.log_apu_ports);
        self.cpu.reset();
        self.cpu.set_trace(self.experiments.trace_instructions);
        self.cpu.load_reset_vector(&mut self.bus);
        self.master_cycles = 0;
        self.apu_fraction = 0;
        self.apu_debt = 0;
        self.reset_timing();
        self.frame_count = 0;
        self.audio_frames = 0;
    }

    /// Drop wall time owed to every domain.
    pub fn reset_timing(&mut self) {
        self.cpu_clock.clear_backlog();
        self.apu_clock.clear_backlog();
        self.video_clock.clear_backlog();
    }

    /// Advance by `elapsed` seconds of wall time.
    ///
    /// Each domain keeps its own backlog and is drained on its own, in the
    /// order CPU, video, APU. The CPU and APU step per instruction and the
    /// video unit a whole frame at a time. Backlogs beyond two frames are
    /// clamped so a stalled host does not trigger a catch-up burst.
    pub fn run(&mut self, elapsed: f64) {
        let limit = MAX_FRAMES_PER_RUN * self.region.frame_period();
        let elapsed = elapsed.clamp(0.0, limit);

        self.cpu_clock.accumulate(elapsed);
        self.apu_clock.accumulate(elapsed);
        self.video_clock.accumulate(elapsed);

        while self.cpu_clock.is_owed() {
            let cycles = self.cpu.step(&mut self.bus);
            self.cpu_clock.consume(u64::from(cycles));
        }

        while self.video_clock.is_owed() {
            self.bus.ppu.run_frame();
            self.service_video_events();
            self.video_clock.consume(1);
        }

        while self.apu_clock.is_owed() {
            let cycles = self.bus.apu.cycle();
            self.apu_clock.consume(u64::from(cycles));
        }
    }

    /// Run one frame on the master clock, stepping CPU, video and APU in
    /// lockstep. Returns the master cycles executed.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.master_cycles;
        let target = start + self.region.master_cycles_per_frame();
        while self.master_cycles < target {
            let cycles = u64::from(self.cpu.step(&mut self.bus)) * CPU_DIVISOR;
            self.master_cycles += cycles;
            self.bus.ppu.tick_n(Ticks::new(cycles));
            self.catch_up_apu(cycles);
            self.service_video_events();
        }
        self.master_cycles - start
    }

    /// Run one frame of APU cycles only, then close the DSP frame.
    ///
    /// The playback pipeline calls this once per host frame; the CPU and
    /// video unit do not move.
    pub fn run_audio_frame(&mut self) {
        self.catch_up_apu(self.region.master_cycles_per_frame());
        self.bus.apu.dsp_mut().new_frame();
        self.audio_frames += 1;
    }

    /// Resample the last completed DSP frame to `wanted` stereo frames.
    pub fn set_samples(&self, out: &mut [i16], wanted: usize) {
        self.bus.apu.dsp().get_samples(out, wanted);
    }

    fn catch_up_apu(&mut self, master_cycles: u64) {
        let (num, den) = self.region.apu_ratio();
        let scaled = master_cycles * num + self.apu_fraction;
        self.apu_fraction = scaled % den;
        self.apu_debt += (scaled / den) as i64;
        while self.apu_debt > 0 {
            self.apu_debt -= i64::from(self.bus.apu.cycle());
        }
    }

    fn service_video_events(&mut self) {
        if self.bus.ppu.take_vblank() {
            if self.bus.signal_vblank() {
                self.cpu.nmi();
            }
            self.bus.apu.dsp_mut().new_frame();
        }
        if self.bus.ppu.take_frame() {
            self.frame_count += 1;
        }
    }

    /// CPU-side read with bus side effects.
    pub fn read(&mut self, address: u32) -> u8 {
        self.bus.read(address)
    }

    /// CPU-side write.
    pub fn write(&mut self, address: u32, value: u8) {
        self.bus.write(address, value);
    }

    #[must_use]
    pub fn region(&self) -> SnesRegion {
        self.region
    }

    #[must_use]
    pub fn experiments(&self) -> ExperimentFlags {
        self.experiments
    }

    /// Native samples per frame for this region.
    #[must_use]
    pub fn wanted_samples(&self) -> usize {
        self.region.wanted_samples()
    }

    /// Frame period in seconds.
    #[must_use]
    pub fn frame_period(&self) -> f64 {
        self.region.frame_period()
    }

    #[must_use]
    pub fn cpu(&self) -> &Wdc65816 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Wdc65816 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SnesBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SnesBus {
        &mut self.bus
    }

    #[must_use]
    pub fn apu(&self) -> &snes_apu::Apu {
        &self.bus.apu
    }

    pub fn apu_mut(&mut self) -> &mut snes_apu::Apu {
        &mut self.bus.apu
    }

    #[must_use]
    pub fn master_cycles(&self) -> u64 {
        self.master_cycles
    }

    /// Completed video frames.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Audio-only frames run by [`Snes::run_audio_frame`].
    #[must_use]
    pub fn audio_frames(&self) -> u64 {
        self.audio_frames
    }
}

fn validate_rom(rom: &[u8]) -> Result<(), SnesError> {
    match rom.len() {
        0 => Err(SnesError::EmptyRom),
        n if n < MIN_ROM_SIZE => Err(SnesError::ShortRom(n)),
        _ => Ok(()),
    }
}

impl Observable for Snes {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("apu.") {
            self.bus.apu.query(rest)
        } else if let Some(rest) = path.strip_prefix("ppu.") {
            match rest {
                "scanline" => Some(self.bus.ppu.scanline().into()),
                "dot" => Some(self.bus.ppu.dot().into()),
                "vblank" => Some(self.bus.ppu.in_vblank().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("wram.") {
            let offset = rest
                .strip_prefix('$')
                .or_else(|| rest.strip_prefix("0x"))
                .map_or_else(|| rest.parse().ok(), |hex| u32::from_str_radix(hex, 16).ok())?;
            Some(self.bus.peek_wram(offset).into())
        } else {
            match path {
                "master_cycles" => Some(self.master_cycles.into()),
                "frame_count" => Some(self.frame_count.into()),
                "audio_frames" => Some(self.audio_frames.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<65816_paths>",
            "apu.<apu_paths>",
            "ppu.scanline",
            "ppu.dot",
            "ppu.vblank",
            "wram.<offset>",
            "master_cycles",
            "frame_count",
            "audio_frames",
        ]
    }
}
