//! ADSR and GAIN envelopes.
//!
//! Every voice has an 11-bit envelope level (0-$7FF). It is stepped once
//! per output sample, but only commits a new level when the shared rate
//! counter says the voice's current rate is due. Rate 0 never fires and
//! rate 31 fires every sample.
//!
//! ADSR1 ($x5): bit 7 selects ADSR (set) or GAIN (clear), bits 6-4 decay
//! rate, bits 3-0 attack rate. ADSR2 ($x6): bits 7-5 sustain level, bits
//! 4-0 sustain rate. GAIN ($x7) is either a direct level (bit 7 clear) or
//! one of four ramp modes.

/// Period of the shared rate counter.
pub const COUNTER_RANGE: u16 = 2048 * 5 * 3;

/// Samples between steps for each rate.
const RATES: [u16; 32] = [
    0, 2048, 1536, 1280, 1024, 768, 640, 512, 384, 320, 256, 192, 160, 128, 96, 80, 64, 48, 40,
    32, 24, 20, 16, 12, 10, 8, 6, 5, 4, 3, 2, 1,
];

/// Phase offsets that stagger rates sharing a period family.
const OFFSETS: [u16; 32] = [
    0, 0, 1040, 536, 0, 1040, 536, 0, 1040, 536, 0, 1040, 536, 0, 1040, 536, 0, 1040, 536, 0,
    1040, 536, 0, 1040, 536, 0, 1040, 536, 0, 1040, 536, 0,
];

/// True when `rate` is due at this counter value.
#[must_use]
pub fn rate_due(counter: u16, rate: u8) -> bool {
    let rate = usize::from(rate & 0x1F);
    if rate == 0 {
        return false;
    }
    (u32::from(counter) + u32::from(OFFSETS[rate])) % u32::from(RATES[rate]) == 0
}

/// Shared countdown driving every envelope and the noise generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCounter(u16);

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self(COUNTER_RANGE - 1)
    }

    /// Count down one sample, wrapping at zero.
    pub fn tick(&mut self) {
        self.0 = if self.0 == 0 { COUNTER_RANGE - 1 } else { self.0 - 1 };
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn due(self, rate: u8) -> bool {
        rate_due(self.0, rate)
    }
}

/// Envelope phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// The envelope registers of one voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeRegs {
    pub adsr1: u8,
    pub adsr2: u8,
    pub gain: u8,
}

/// Envelope generator for one voice.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    level: u16,
    /// Unclamped level of the last step. Bent-line GAIN looks at this.
    hidden: i32,
    mode: EnvelopeMode,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            level: 0,
            hidden: 0,
            mode: EnvelopeMode::Release,
        }
    }

    #[must_use]
    pub const fn level(&self) -> u16 {
        self.level
    }

    #[must_use]
    pub const fn mode(&self) -> EnvelopeMode {
        self.mode
    }

    pub fn key_on(&mut self) {
        self.level = 0;
        self.hidden = 0;
        self.mode = EnvelopeMode::Attack;
    }

    pub fn key_off(&mut self) {
        self.mode = EnvelopeMode::Release;
    }

    /// Drop straight to silence (soft reset, or a sample ending without a
    /// loop).
    pub fn silence(&mut self) {
        self.mode = EnvelopeMode::Release;
        self.level = 0;
        self.hidden = 0;
    }

    /// Advance one sample.
    pub fn step(&mut self, regs: EnvelopeRegs, counter: RateCounter) {
        let mut level = i32::from(self.level);

        if self.mode == EnvelopeMode::Release {
            // Release ignores the rate counter.
            self.level = (level - 8).max(0) as u16;
            self.hidden = i32::from(self.level);
            return;
        }

        let rate;
        let sustain_source;
        if regs.adsr1 & 0x80 != 0 {
            sustain_source = regs.adsr2;
            match self.mode {
                EnvelopeMode::Attack => {
                    rate = (regs.adsr1 & 0x0F) * 2 + 1;
                    level += if rate < 31 { 0x20 } else { 0x400 };
                }
                EnvelopeMode::Decay => {
                    level -= 1;
                    level -= level >> 8;
                    rate = ((regs.adsr1 >> 4) & 0x07) * 2 + 0x10;
                }
                _ => {
                    level -= 1;
                    level -= level >> 8;
                    rate = regs.adsr2 & 0x1F;
                }
            }
        } else {
            sustain_source = regs.gain;
            let mode = regs.gain >> 5;
            if mode < 4 {
                level = i32::from(regs.gain) * 0x10;
                rate = 31;
            } else {
                rate = regs.gain & 0x1F;
                match mode {
                    4 => level -= 0x20,
                    5 => {
                        level -= 1;
                        level -= level >> 8;
                    }
                    6 => level += 0x20,
                    _ => level += if self.hidden >= 0x600 { 0x08 } else { 0x20 },
                }
            }
        }

        if self.mode == EnvelopeMode::Decay && (level >> 8) == i32::from(sustain_source >> 5) {
            self.mode = EnvelopeMode::Sustain;
        }

        self.hidden = level;
        if !(0..=0x7FF).contains(&level) {
            level = level.clamp(0, 0x7FF);
            if self.mode == EnvelopeMode::Attack {
                self.mode = EnvelopeMode::Decay;
            }
        }

        if counter.due(rate) {
            self.level = level as u16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(env: &mut Envelope, regs: EnvelopeRegs, counter: &mut RateCounter, samples: usize) {
        for _ in 0..samples {
            counter.tick();
            env.step(regs, *counter);
        }
    }

    #[test]
    fn rate_zero_never_fires_and_rate_31_always_does() {
        for counter in 0..COUNTER_RANGE {
            assert!(!rate_due(counter, 0));
            assert!(rate_due(counter, 31));
        }
    }

    #[test]
    fn rate_periods_match_table() {
        let fired = (0..COUNTER_RANGE).filter(|&c| rate_due(c, 1)).count();
        assert_eq!(fired, usize::from(COUNTER_RANGE / 2048));
        let fired = (0..COUNTER_RANGE).filter(|&c| rate_due(c, 2)).count();
        assert_eq!(fired, usize::from(COUNTER_RANGE / 1536));
    }

    #[test]
    fn counter_wraps() {
        let mut counter = RateCounter::new();
        assert_eq!(counter.value(), 0x77FF);
        for _ in 0..COUNTER_RANGE {
            counter.tick();
        }
        assert_eq!(counter.value(), 0x77FF);
    }

    #[test]
    fn fastest_attack_jumps_by_0x400() {
        let mut env = Envelope::new();
        let mut counter = RateCounter::new();
        let regs = EnvelopeRegs { adsr1: 0x8F, adsr2: 0xE0, gain: 0 };
        env.key_on();
        run(&mut env, regs, &mut counter, 1);
        assert_eq!(env.level(), 0x400);
        run(&mut env, regs, &mut counter, 1);
        assert_eq!(env.level(), 0x7FF);
        assert_eq!(env.mode(), EnvelopeMode::Decay);
    }

    #[test]
    fn decay_settles_into_sustain_level() {
        let mut env = Envelope::new();
        let mut counter = RateCounter::new();
        // Fastest attack and decay, sustain level 3, slowest sustain rate.
        let regs = EnvelopeRegs { adsr1: 0xFF, adsr2: 0x61, gain: 0 };
        env.key_on();
        run(&mut env, regs, &mut counter, 20_000);
        assert_eq!(env.mode(), EnvelopeMode::Sustain);
        assert_eq!(env.level() >> 8, 3);
    }

    #[test]
    fn release_ramps_to_zero_by_eight() {
        let mut env = Envelope::new();
        let mut counter = RateCounter::new();
        let regs = EnvelopeRegs { adsr1: 0x00, adsr2: 0x00, gain: 0x7F };
        env.key_on();
        run(&mut env, regs, &mut counter, 1);
        assert_eq!(env.level(), 0x7F0, "direct GAIN");
        env.key_off();
        run(&mut env, regs, &mut counter, 1);
        assert_eq!(env.level(), 0x7E8);
        run(&mut env, regs, &mut counter, 0x7F0 / 8);
        assert_eq!(env.level(), 0);
    }

    #[test]
    fn linear_gain_increase_saturates() {
        let mut env = Envelope::new();
        let mut counter = RateCounter::new();
        let regs = EnvelopeRegs { adsr1: 0x00, adsr2: 0x00, gain: 0xDF };
        env.key_on();
        run(&mut env, regs, &mut counter, 0x40);
        assert_eq!(env.level(), 0x7FF);
    }

    #[test]
    fn bent_gain_slows_above_0x600() {
        let mut env = Envelope::new();
        let mut counter = RateCounter::new();
        let regs = EnvelopeRegs { adsr1: 0x00, adsr2: 0x00, gain: 0xFF };
        env.key_on();
        run(&mut env, regs, &mut counter, 0x30);
        assert_eq!(env.level(), 0x600);
        run(&mut env, regs, &mut counter, 1);
        assert_eq!(env.level(), 0x608);
    }
}
