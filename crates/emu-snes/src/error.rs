use thiserror::Error;

/// Smallest image the LoROM map can hold a reset vector in.
pub const MIN_ROM_SIZE: usize = 0x8000;

/// Errors from building or re-initialising a [`crate::Snes`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnesError {
    #[error("no ROM data supplied")]
    EmptyRom,

    #[error("ROM is {0} bytes, need at least {MIN_ROM_SIZE} for the vector table")]
    ShortRom(usize),
}
