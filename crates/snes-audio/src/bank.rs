//! Sound bank blocks.
//!
//! A bank is a run of `[u16 size][u16 aram_addr][size bytes]` records,
//! little-endian, ended by a zero size or by running out of data. A block
//! that claims more bytes than remain ends the bank early; the blocks
//! before it are still used.

use snes_apu::Apu;

/// One upload block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub aram_addr: u16,
    pub data: &'a [u8],
}

/// Iterator over the blocks of a bank starting at the front of `data`.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

/// Walk the blocks of the bank at the front of `data`.
#[must_use]
pub fn blocks(data: &[u8]) -> Blocks<'_> {
    Blocks {
        data,
        offset: 0,
        done: false,
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Block<'a>> {
        if self.done || self.offset + 4 >= self.data.len() {
            self.done = true;
            return None;
        }
        let header = &self.data[self.offset..self.offset + 4];
        let size = usize::from(u16::from_le_bytes([header[0], header[1]]));
        let aram_addr = u16::from_le_bytes([header[2], header[3]]);
        if size == 0 {
            self.done = true;
            return None;
        }
        let start = self.offset + 4;
        let Some(data) = self.data.get(start..start + size) else {
            log::warn!(
                "bank: block at +${:X} wants {size} bytes for ${aram_addr:04X}, only {} left",
                self.offset,
                self.data.len() - start
            );
            self.done = true;
            return None;
        };
        self.offset = start + size;
        Some(Block { aram_addr, data })
    }
}

/// Summary of one bank upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub blocks: usize,
    pub bytes: usize,
}

/// Copy every block of the bank at the front of `data` into ARAM.
pub fn upload(apu: &mut Apu, data: &[u8]) -> UploadSummary {
    let mut summary = UploadSummary::default();
    for block in blocks(data) {
        log::debug!(
            "bank: {} bytes -> ARAM ${:04X}",
            block.data.len(),
            block.aram_addr
        );
        apu.upload(block.aram_addr, block.data);
        summary.blocks += 1;
        summary.bytes += block.data.len();
    }
    summary
}

/// Encode blocks in bank format, zero-terminated.
#[must_use]
pub fn encode(blocks: &[(u16, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(addr, data) in blocks {
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(&addr.to_le_bytes());
        out.extend_from_slice(data);
    }
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}
