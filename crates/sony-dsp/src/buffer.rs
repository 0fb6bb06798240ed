//! Stereo output ring buffer with frame boundaries.
//!
//! The DSP pushes one stereo sample every 32 APU cycles. The host marks
//! the end of each video frame with [`SampleBuffer::new_frame`]; readers
//! only ever see samples up to the last marked boundary.

/// Ring capacity in stereo samples. Several frames at either field rate.
pub const RING_SAMPLES: usize = 0x1000;

const MASK: u32 = RING_SAMPLES as u32 - 1;

pub struct SampleBuffer {
    ring: Box<[[i16; 2]; RING_SAMPLES]>,
    /// Total samples written, wrapping.
    offset: u32,
    /// `offset` at the most recent frame mark.
    frame_boundary: u32,
    /// `offset` at the mark before that.
    previous_boundary: u32,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ring: Box::new([[0; 2]; RING_SAMPLES]),
            offset: 0,
            frame_boundary: 0,
            previous_boundary: 0,
        }
    }

    /// Clear all samples and boundaries.
    pub fn reset(&mut self) {
        self.ring.fill([0; 2]);
        self.offset = 0;
        self.frame_boundary = 0;
        self.previous_boundary = 0;
    }

    pub fn push(&mut self, left: i16, right: i16) {
        self.ring[(self.offset & MASK) as usize] = [left, right];
        self.offset = self.offset.wrapping_add(1);
    }

    /// Mark the end of a frame at the current write position.
    pub fn new_frame(&mut self) {
        self.previous_boundary = self.frame_boundary;
        self.frame_boundary = self.offset;
    }

    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub const fn frame_boundary(&self) -> u32 {
        self.frame_boundary
    }

    /// Samples produced in the last completed frame.
    #[must_use]
    pub fn last_frame_len(&self) -> u32 {
        self.frame_boundary
            .wrapping_sub(self.previous_boundary)
            .min(RING_SAMPLES as u32)
    }

    /// Fill `out` (interleaved stereo) with `wanted` samples resampled from
    /// the last completed frame. Missing data reads as silence.
    pub fn get_samples(&self, out: &mut [i16], wanted: usize) {
        let span = self.last_frame_len();
        let frames = out.chunks_exact_mut(2).take(wanted);
        if span == 0 || wanted == 0 {
            frames.for_each(|frame| frame.fill(0));
            return;
        }
        let start = self.frame_boundary.wrapping_sub(span);
        let step = f64::from(span) / wanted as f64;
        for (i, frame) in frames.enumerate() {
            // i * step < span, so this never crosses the boundary.
            let position = start.wrapping_add((i as f64 * step) as u32);
            let [left, right] = self.ring[(position & MASK) as usize];
            frame[0] = left;
            frame[1] = right;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_stop_at_frame_boundary() {
        let mut buffer = SampleBuffer::new();
        for i in 0..100 {
            buffer.push(i, -i);
        }
        buffer.new_frame();
        // Samples after the boundary must not be visible.
        for _ in 0..50 {
            buffer.push(i16::MAX, i16::MAX);
        }
        let mut out = vec![0; 200];
        buffer.get_samples(&mut out, 100);
        for i in 0..100 {
            assert_eq!(out[i * 2], i as i16);
            assert_eq!(out[i * 2 + 1], -(i as i16));
        }
    }

    #[test]
    fn resamples_frame_to_wanted_count() {
        let mut buffer = SampleBuffer::new();
        buffer.new_frame();
        for i in 0..534 {
            buffer.push(i, i);
        }
        buffer.new_frame();
        assert_eq!(buffer.last_frame_len(), 534);
        let mut out = vec![0; 2 * 533];
        buffer.get_samples(&mut out, 533);
        assert_eq!(out[0], 0);
        assert!(out[2 * 532] <= 533);
        assert!(out.chunks(2).all(|f| f[0] < 534));
    }

    #[test]
    fn empty_frame_is_silence() {
        let buffer = SampleBuffer::new();
        let mut out = vec![7; 20];
        buffer.get_samples(&mut out, 10);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn reset_clears_offsets() {
        let mut buffer = SampleBuffer::new();
        buffer.push(1, 1);
        buffer.new_frame();
        buffer.reset();
        assert_eq!(buffer.offset(), 0);
        assert_eq!(buffer.frame_boundary(), 0);
        assert_eq!(buffer.last_frame_len(), 0);
    }
}
