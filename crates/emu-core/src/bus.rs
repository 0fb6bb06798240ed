//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// Addresses are 24-bit for the 65816 and 16-bit for the SPC700; each bus
/// implementation masks to its own width. Multi-byte helpers are
/// little-endian and advance the address with 24-bit wraparound, so callers
/// that need a narrower wrap (direct page, stack) compute each byte address
/// themselves.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u32) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u32, value: u8);

    /// Read a little-endian 16-bit word.
    fn read_word(&mut self, address: u32) -> u16 {
        let lo = self.read(address);
        let hi = self.read(address.wrapping_add(1) & 0x00FF_FFFF);
        u16::from_le_bytes([lo, hi])
    }

    /// Read a little-endian 24-bit value.
    fn read_long(&mut self, address: u32) -> u32 {
        let lo = u32::from(self.read_word(address));
        let bank = u32::from(self.read(address.wrapping_add(2) & 0x00FF_FFFF));
        lo | (bank << 16)
    }

    /// Write a little-endian 16-bit word.
    fn write_word(&mut self, address: u32, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo);
        self.write(address.wrapping_add(1) & 0x00FF_FFFF, hi);
    }

    /// Write a little-endian 24-bit value.
    fn write_long(&mut self, address: u32, value: u32) {
        self.write_word(address, value as u16);
        self.write(address.wrapping_add(2) & 0x00FF_FFFF, (value >> 16) as u8);
    }
}

/// Flat RAM covering the whole address space. Used by CPU tests and by
/// anything that needs a plain byte array behind a [`Bus`].
pub struct SimpleBus {
    memory: Box<[u8]>,
    mask: u32,
}

impl SimpleBus {
    /// 16 MiB of RAM, the full 65816 address space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(1 << 24)
    }

    /// RAM of `size` bytes. Addresses wrap at `size`, which must be a power
    /// of two.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            memory: vec![0; size].into_boxed_slice(),
            mask: (size - 1) as u32,
        }
    }

    /// Copy `data` into memory starting at `address`.
    pub fn load(&mut self, address: u32, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let addr = (address.wrapping_add(i as u32) & self.mask) as usize;
            self.memory[addr] = byte;
        }
    }

    /// Read without going through the [`Bus`] trait.
    #[must_use]
    pub fn peek(&self, address: u32) -> u8 {
        self.memory[(address & self.mask) as usize]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u32) -> u8 {
        self.memory[(address & self.mask) as usize]
    }

    fn write(&mut self, address: u32, value: u8) {
        self.memory[(address & self.mask) as usize] = value;
    }
}
