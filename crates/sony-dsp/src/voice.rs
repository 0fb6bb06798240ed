//! One DSP voice: BRR stream position, pitch stepping and interpolation.

use crate::Aram;
use crate::brr::{BLOCK_SIZE, BrrDecoder, BrrHeader, SAMPLES_PER_BLOCK};
use crate::envelope::Envelope;

/// How a voice reconstructs output between decoded samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the last sample.
    Nearest,
    /// Straight line between neighbouring samples.
    #[default]
    Linear,
    /// Catmull-Rom cubic over four samples.
    Cubic,
}

impl Interpolation {
    /// Map a UI selector index. Unknown values fall back to linear.
    #[must_use]
    pub const fn from_index(index: i32) -> Self {
        match index {
            0 => Self::Nearest,
            2 => Self::Cubic,
            _ => Self::Linear,
        }
    }

    #[must_use]
    pub const fn index(self) -> i32 {
        match self {
            Self::Nearest => 0,
            Self::Linear => 1,
            Self::Cubic => 2,
        }
    }
}

/// Runtime state of a voice. Register values live in the DSP register
/// file; this holds everything the hardware keeps internally.
#[derive(Debug, Clone)]
pub struct Voice {
    pub envelope: Envelope,
    decoder: BrrDecoder,
    header: BrrHeader,
    block: [i16; SAMPLES_PER_BLOCK],
    block_addr: u16,
    /// Next sample of `block` to shift into `history`.
    index: usize,
    /// 12-bit fractional position between `history[1]` and `history[2]`.
    fraction: u16,
    /// Most recent four samples, oldest first.
    history: [i16; 4],
    keyed_on: bool,
    /// Output after the envelope, before volume. OUTX and pitch
    /// modulation read this.
    pub output: i16,
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            envelope: Envelope::new(),
            decoder: BrrDecoder::new(),
            header: BrrHeader {
                shift: 0,
                filter: 0,
                loop_flag: false,
                end: false,
            },
            block: [0; SAMPLES_PER_BLOCK],
            block_addr: 0,
            index: 0,
            fraction: 0,
            history: [0; 4],
            keyed_on: false,
            output: 0,
        }
    }

    /// True from key-on until the sample ends without looping or the
    /// release has fully faded.
    #[must_use]
    pub const fn is_keyed_on(&self) -> bool {
        self.keyed_on
    }

    /// Address of the BRR block currently being played.
    #[must_use]
    pub const fn block_addr(&self) -> u16 {
        self.block_addr
    }

    /// Restart at `start` with a fresh envelope.
    pub fn start(&mut self, start: u16, ram: &Aram) {
        self.block_addr = start;
        self.decoder.reset();
        self.history = [0; 4];
        self.index = 0;
        self.fraction = 0;
        self.output = 0;
        self.load_block(ram);
        self.envelope.key_on();
        self.keyed_on = true;
    }

    pub fn key_off(&mut self) {
        self.envelope.key_off();
    }

    pub fn silence(&mut self) {
        self.envelope.silence();
        self.keyed_on = false;
    }

    fn load_block(&mut self, ram: &Aram) {
        let addr = self.block_addr;
        let bytes: [u8; BLOCK_SIZE] =
            std::array::from_fn(|i| ram[usize::from(addr.wrapping_add(i as u16))]);
        self.header = BrrHeader::from_byte(bytes[0]);
        self.block = self.decoder.decode_block(&bytes);
    }

    /// Current 15-bit sample at the fractional position.
    #[must_use]
    pub fn sample(&self, interpolation: Interpolation) -> i32 {
        let [p0, p1, p2, p3] = self.history.map(i32::from);
        let t = i32::from(self.fraction);
        match interpolation {
            Interpolation::Nearest => p1,
            Interpolation::Linear => p1 + (((p2 - p1) * t) >> 12),
            Interpolation::Cubic => {
                // Catmull-Rom in 12-bit fixed point, evaluated between p1 and p2.
                let a = -p0 + 3 * p1 - 3 * p2 + p3;
                let b = 2 * p0 - 5 * p1 + 4 * p2 - p3;
                let c = -p0 + p2;
                let t2 = (t * t) >> 12;
                let t3 = (t2 * t) >> 12;
                let value = ((a * t3 + b * t2 + c * t) >> 13) + p1;
                value.clamp(-0x4000, 0x3FFF)
            }
        }
    }

    /// Advance by `pitch` (4096 = one sample per output sample).
    ///
    /// `loop_addr` is where the sample continues after a block carrying the
    /// end flag. Returns true if an end block was passed, so the caller can
    /// latch ENDX.
    pub fn advance(&mut self, pitch: u16, loop_addr: u16, ram: &Aram) -> bool {
        let mut ended = false;
        let mut position = u32::from(self.fraction) + u32::from(pitch);
        while position >= 0x1000 {
            position -= 0x1000;
            self.history = [
                self.history[1],
                self.history[2],
                self.history[3],
                self.block[self.index],
            ];
            self.index += 1;
            if self.index == SAMPLES_PER_BLOCK {
                self.index = 0;
                if self.header.end {
                    ended = true;
                    if !self.header.loop_flag {
                        self.silence();
                    }
                    self.block_addr = loop_addr;
                } else {
                    self.block_addr = self.block_addr.wrapping_add(BLOCK_SIZE as u16);
                }
                self.load_block(ram);
            }
        }
        self.fraction = position as u16;

        if self.keyed_on
            && self.envelope.level() == 0
            && self.envelope.mode() == crate::EnvelopeMode::Release
        {
            self.keyed_on = false;
        }
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram_with_blocks(blocks: &[[u8; BLOCK_SIZE]], at: u16) -> Box<Aram> {
        let mut ram = Box::new([0u8; 0x10000]);
        for (i, block) in blocks.iter().enumerate() {
            let base = usize::from(at) + i * BLOCK_SIZE;
            ram[base..base + BLOCK_SIZE].copy_from_slice(block);
        }
        ram
    }

    #[test]
    fn pitch_0x1000_consumes_one_sample_per_step() {
        let ram = ram_with_blocks(&[[0xC0, 0x12, 0x34, 0x56, 0x70, 0, 0, 0, 0]], 0x1000);
        let mut voice = Voice::new();
        voice.start(0x1000, &ram);
        for _ in 0..3 {
            voice.advance(0x1000, 0x1000, &ram);
        }
        // Residuals 1, 2, 3 at shift 12 decode to n * 2048.
        assert_eq!(voice.history, [0, 1 << 11, 2 << 11, 3 << 11]);
        assert_eq!(voice.sample(Interpolation::Nearest), 1 << 11);
    }

    #[test]
    fn end_without_loop_silences() {
        let ram = ram_with_blocks(&[[0xC1, 0x77, 0x77, 0x77, 0x77, 0x77, 0x77, 0x77, 0x77]], 0x2000);
        let mut voice = Voice::new();
        voice.start(0x2000, &ram);
        assert!(voice.is_keyed_on());
        let mut ended = false;
        for _ in 0..16 {
            ended |= voice.advance(0x1000, 0x2000, &ram);
        }
        assert!(ended);
        assert!(!voice.is_keyed_on());
        assert_eq!(voice.envelope.level(), 0);
    }

    #[test]
    fn end_with_loop_jumps_to_loop_point() {
        let ram = ram_with_blocks(
            &[
                [0xC0, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11],
                [0xC3, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22],
            ],
            0x3000,
        );
        let mut voice = Voice::new();
        voice.start(0x3000, &ram);
        let mut ended = false;
        for _ in 0..32 {
            ended |= voice.advance(0x1000, 0x3009, &ram);
        }
        assert!(ended);
        assert!(voice.is_keyed_on());
        assert_eq!(voice.block_addr(), 0x3009);
    }

    #[test]
    fn linear_interpolation_is_midpoint_at_half() {
        let mut voice = Voice::new();
        voice.history = [0, 100, 300, 0];
        voice.fraction = 0x800;
        assert_eq!(voice.sample(Interpolation::Linear), 200);
        assert_eq!(voice.sample(Interpolation::Nearest), 100);
        voice.fraction = 0;
        assert_eq!(voice.sample(Interpolation::Cubic), 100);
    }

    #[test]
    fn interpolation_index_round_trip() {
        for mode in [Interpolation::Nearest, Interpolation::Linear, Interpolation::Cubic] {
            assert_eq!(Interpolation::from_index(mode.index()), mode);
        }
        assert_eq!(Interpolation::from_index(99), Interpolation::Linear);
    }
}
