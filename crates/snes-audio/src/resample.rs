//! Linear stereo rate conversion.
//!
//! Positions are tracked in integer units of `1 / to` so long runs never
//! drift: over any stretch of input, the output frame count stays within
//! one frame of `input × to / from`.

/// Streaming linear resampler for interleaved i16 stereo.
#[derive(Debug, Clone)]
pub struct Resampler {
    from: u32,
    to: u32,
    /// Position of the next output between `last` and the next input, in
    /// units of `1 / to`.
    phase: u64,
    last: [i16; 2],
}

impl Resampler {
    #[must_use]
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from: from.max(1),
            to: to.max(1),
            phase: 0,
            last: [0; 2],
        }
    }

    #[must_use]
    pub const fn rates(&self) -> (u32, u32) {
        (self.from, self.to)
    }

    /// Forget stream history.
    pub fn reset(&mut self) {
        self.phase = 0;
        self.last = [0; 2];
    }

    /// Convert `input` (interleaved stereo) and append to `out`.
    pub fn process(&mut self, input: &[i16], out: &mut Vec<i16>) {
        let to = u64::from(self.to);
        let step = u64::from(self.from);
        out.reserve(input.len() * self.to as usize / self.from as usize + 2);
        for frame in input.chunks_exact(2) {
            let current = [frame[0], frame[1]];
            while self.phase < to {
                for ch in 0..2 {
                    let a = i64::from(self.last[ch]);
                    let b = i64::from(current[ch]);
                    let value = a + (b - a) * self.phase as i64 / to as i64;
                    out.push(value as i16);
                }
                self.phase += step;
            }
            self.phase -= to;
            self.last = current;
        }
    }

    /// Output frames produced for `frames` more input frames, given the
    /// current phase.
    #[must_use]
    pub fn output_frames(&self, frames: usize) -> usize {
        let to = u64::from(self.to);
        let step = u64::from(self.from);
        let total = frames as u64 * to;
        // Outputs land at phase, phase + step, ... below total.
        if total <= self.phase {
            return 0;
        }
        (total - self.phase).div_ceil(step) as usize
    }
}
