//! BRR (bit rate reduction) sample decoding.
//!
//! A BRR block is 9 bytes: a header followed by 16 signed 4-bit residuals,
//! high nibble first. The header packs:
//!
//! | bits | meaning |
//! |------|---------|
//! | 7-4  | shift (0-12 valid, 13-15 degenerate) |
//! | 3-2  | prediction filter 0-3 |
//! | 1    | loop: jump to the sample's loop point after this block |
//! | 0    | end of sample |
//!
//! Decoding is bit-exact: each residual is shifted, the filter adds a
//! prediction from the previous two outputs, the sum is clamped to 16 bits
//! and then wrapped to 15 bits. Outputs are 15-bit values in an `i16`.

/// Bytes per block.
pub const BLOCK_SIZE: usize = 9;

/// Samples per block.
pub const SAMPLES_PER_BLOCK: usize = 16;

/// Decoded block header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrrHeader {
    pub shift: u8,
    pub filter: u8,
    pub loop_flag: bool,
    pub end: bool,
}

impl BrrHeader {
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self {
            shift: byte >> 4,
            filter: (byte >> 2) & 0x03,
            loop_flag: byte & 0x02 != 0,
            end: byte & 0x01 != 0,
        }
    }
}

/// Decoder state: the previous two outputs feed the prediction filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrrDecoder {
    old: i32,
    older: i32,
}

impl BrrDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self { old: 0, older: 0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Decode one 9-byte block.
    pub fn decode_block(&mut self, block: &[u8; BLOCK_SIZE]) -> [i16; SAMPLES_PER_BLOCK] {
        let header = BrrHeader::from_byte(block[0]);
        let mut out = [0; SAMPLES_PER_BLOCK];
        for (i, slot) in out.iter_mut().enumerate() {
            let byte = block[1 + i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            // Sign-extend the 4-bit residual.
            let residual = i32::from(((nibble << 4) as i8) >> 4);
            *slot = self.decode_residual(residual, header);
        }
        out
    }

    fn decode_residual(&mut self, residual: i32, header: BrrHeader) -> i16 {
        let mut sample = if header.shift <= 12 {
            (residual << header.shift) >> 1
        } else if residual < 0 {
            -0x800
        } else {
            0
        };

        let old = self.old;
        let older = self.older;
        sample += match header.filter {
            0 => 0,
            1 => old + ((-old) >> 4),
            2 => (old << 1) + ((-old * 3) >> 5) - older + (older >> 4),
            _ => (old << 1) + ((-old * 13) >> 6) - older + ((older * 3) >> 4),
        };

        let clamped = sample.clamp(-0x8000, 0x7FFF) as i16;
        let wrapped = (clamped << 1) >> 1;

        self.older = old;
        self.old = i32::from(wrapped);
        wrapped
    }
}

/// Decode a whole sample, stopping after the block with the end flag or
/// when the data runs out. A trailing partial block is ignored.
#[must_use]
pub fn decode_sample(data: &[u8]) -> Vec<i16> {
    let mut decoder = BrrDecoder::new();
    let mut out = Vec::with_capacity(data.len() / BLOCK_SIZE * SAMPLES_PER_BLOCK);
    for chunk in data.chunks_exact(BLOCK_SIZE) {
        let mut block = [0; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        out.extend_from_slice(&decoder.decode_block(&block));
        if BrrHeader::from_byte(block[0]).end {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(header: u8, nibble: u8) -> [u8; BLOCK_SIZE] {
        let pair = (nibble << 4) | nibble;
        [header, pair, pair, pair, pair, pair, pair, pair, pair]
    }

    #[test]
    fn header_fields() {
        let header = BrrHeader::from_byte(0xC7);
        assert_eq!(header.shift, 12);
        assert_eq!(header.filter, 1);
        assert!(header.loop_flag);
        assert!(header.end);
    }

    #[test]
    fn filter_zero_shift_zero_halves_residual() {
        let mut decoder = BrrDecoder::new();
        let out = decoder.decode_block(&[0x00, 0x78, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(out[0], 3);
        assert_eq!(out[1], -4);
    }

    #[test]
    fn shift_twelve_reaches_full_scale() {
        let mut decoder = BrrDecoder::new();
        assert_eq!(decoder.decode_block(&block(0xC0, 0x7))[0], 14336);
        assert_eq!(decoder.decode_block(&block(0xC0, 0x8))[0], -16384);
    }

    #[test]
    fn degenerate_shift_keeps_only_sign() {
        let mut decoder = BrrDecoder::new();
        assert!(decoder.decode_block(&block(0xD0, 0xF)).iter().all(|&s| s == -2048));
        assert!(decoder.decode_block(&block(0xF0, 0x7)).iter().all(|&s| s == 0));
    }

    #[test]
    fn filter_one_decays_previous_output() {
        let mut decoder = BrrDecoder::new();
        let first = decoder.decode_block(&block(0xC0, 0x2));
        assert_eq!(first[15], 4096);
        let second = decoder.decode_block(&block(0x04, 0x0));
        assert_eq!(second[0], 4096 - 256);
        assert_eq!(second[1], 3840 - 240);
    }

    #[test]
    fn overflow_wraps_at_fifteen_bits() {
        let mut decoder = BrrDecoder::new();
        decoder.decode_block(&block(0xC0, 0x7));
        // 14336 + 14336 - 896 = 27776, which wraps rather than saturating.
        let out = decoder.decode_block(&block(0xC4, 0x7));
        assert_eq!(out[0], -4992);
    }

    #[test]
    fn decode_sample_stops_at_end_flag() {
        let mut data = Vec::new();
        data.extend_from_slice(&block(0xC0, 0x1));
        data.extend_from_slice(&block(0xC1, 0x1));
        data.extend_from_slice(&block(0xC0, 0x1));
        assert_eq!(decode_sample(&data).len(), 32);
        assert_eq!(decode_sample(&data[..13]).len(), 16, "partial block ignored");
    }
}
