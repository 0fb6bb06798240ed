use thiserror::Error;

use crate::liveness::LivenessFault;

/// Failures from an audio sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("unsupported audio configuration: {0}")]
    UnsupportedConfig(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("sink is not initialised")]
    NotInitialized,

    /// Native samples were queued while resampling is off and the device
    /// runs at a different rate.
    #[error("native rate {native} Hz does not match device rate {device} Hz")]
    RateMismatch { native: u32, device: u32 },
}

/// Failures from the playback pipeline.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no ROM loaded")]
    NoRom,

    #[error("failed to start the emulator: {0}")]
    Snes(#[from] emu_snes::SnesError),

    #[error("audio sink: {0}")]
    Sink(#[from] SinkError),

    #[error("no song at index {0}")]
    UnknownSong(usize),

    #[error("no segment {segment} in song {song}")]
    UnknownSegment { song: usize, segment: usize },

    #[error("song {0} was edited but has no serialized data")]
    NotSerialized(usize),

    #[error("no instrument {0}")]
    UnknownInstrument(usize),

    #[error("no sample {0}")]
    UnknownSample(usize),

    #[error("sound bank {bank} at ROM offset ${offset:06X} is outside the ROM")]
    UnknownBank { bank: u8, offset: u32 },

    #[error(transparent)]
    Liveness(#[from] LivenessFault),
}
