//! SNES configuration.

/// Master cycles per scanline, the same in both regions.
pub const MASTER_CYCLES_PER_LINE: u64 = 1364;

/// Video region. Determines frame timing and the APU:master clock ratio.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SnesRegion {
    /// NTSC: 60.0988 Hz, 262 scanlines, 21,477,272 Hz crystal.
    #[default]
    Ntsc,
    /// PAL: 50.007 Hz, 312 scanlines, 21,281,370 Hz crystal.
    Pal,
}

impl SnesRegion {
    /// Master crystal frequency in Hz.
    #[must_use]
    pub const fn crystal_hz(self) -> u64 {
        match self {
            Self::Ntsc => 21_477_272,
            Self::Pal => 21_281_370,
        }
    }

    /// Total scanlines per frame, VBlank included.
    #[must_use]
    pub const fn scanlines_per_frame(self) -> u16 {
        match self {
            Self::Ntsc => 262,
            Self::Pal => 312,
        }
    }

    /// First VBlank line. The NMI fires at its start.
    #[must_use]
    pub const fn vblank_line(self) -> u16 {
        225
    }

    /// Nominal field rate used for the APU ratio (60 or 50 Hz).
    #[must_use]
    pub const fn nominal_rate(self) -> u64 {
        match self {
            Self::Ntsc => 60,
            Self::Pal => 50,
        }
    }

    /// Measured field rate in Hz, used for wall-clock pacing.
    #[must_use]
    pub const fn field_rate(self) -> f64 {
        match self {
            Self::Ntsc => 60.0988,
            Self::Pal => 50.007,
        }
    }

    /// Length of one frame in seconds.
    #[must_use]
    pub fn frame_period(self) -> f64 {
        1.0 / self.field_rate()
    }

    /// Master cycles in one frame.
    #[must_use]
    pub const fn master_cycles_per_frame(self) -> u64 {
        MASTER_CYCLES_PER_LINE * self.scanlines_per_frame() as u64
    }

    /// APU cycles per master cycle as `(numerator, denominator)`.
    #[must_use]
    pub const fn apu_ratio(self) -> (u64, u64) {
        (
            sony_dsp::SAMPLE_RATE as u64 * sony_dsp::CYCLES_PER_SAMPLE as u64,
            self.master_cycles_per_frame() * self.nominal_rate(),
        )
    }

    /// Native samples the host asks for per frame: 32040 / field rate,
    /// rounded (533 NTSC, 641 PAL).
    #[must_use]
    pub const fn wanted_samples(self) -> usize {
        match self {
            Self::Ntsc => 533,
            Self::Pal => 641,
        }
    }
}

/// Debug switches. Passed in explicitly; nothing reads them from globals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentFlags {
    /// Log every 65816 instruction at trace level.
    pub trace_instructions: bool,
    /// Log every value the SPC700 writes to its output ports.
    pub log_apu_ports: bool,
}

/// SNES configuration.
#[derive(Debug, Clone, Default)]
pub struct SnesConfig {
    /// LoROM image, header stripped.
    pub rom_data: Vec<u8>,
    /// Video region. Defaults to NTSC.
    pub region: SnesRegion,
    pub experiments: ExperimentFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_lengths() {
        assert_eq!(SnesRegion::Ntsc.master_cycles_per_frame(), 357_368);
        assert_eq!(SnesRegion::Pal.master_cycles_per_frame(), 425_568);
    }

    #[test]
    fn wanted_samples_match_field_rate() {
        for region in [SnesRegion::Ntsc, SnesRegion::Pal] {
            let exact = f64::from(sony_dsp::SAMPLE_RATE) / region.field_rate();
            assert_eq!(region.wanted_samples(), exact.round() as usize, "{region:?}");
        }
    }

    #[test]
    fn apu_ratio_gives_one_field_of_cycles_per_frame() {
        for region in [SnesRegion::Ntsc, SnesRegion::Pal] {
            let (num, den) = region.apu_ratio();
            let per_frame = region.master_cycles_per_frame() * num / den;
            let expected = 32_040 * 32 / region.nominal_rate();
            assert!(per_frame.abs_diff(expected) <= 1, "{region:?}: {per_frame}");
        }
    }
}
