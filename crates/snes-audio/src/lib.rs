//! SNES music playback.
//!
//! Builds on [`emu_snes`] to play the game's songs through the emulated
//! APU: sound banks are uploaded from ROM, songs are started through the
//! driver's mailbox ports, and each host frame the DSP's output is pushed
//! to an [`AudioSink`].
//!
//! The pipeline is single-threaded. Call [`MusicPlayer::update`] from the
//! host loop at least once per frame period; it never runs more than one
//! frame per call. Sinks that talk to a device (the `cpal` feature) hand
//! samples to the device thread through a ring buffer.

pub mod bank;
mod buffered;
#[cfg(feature = "cpal")]
mod cpal_sink;
mod error;
pub mod liveness;
mod player;
mod resample;
mod sink;
pub mod song;

pub use buffered::BufferedSink;
#[cfg(feature = "cpal")]
pub use cpal_sink::CpalSink;
pub use error::{PlayerError, SinkError};
pub use liveness::{LivenessFault, LivenessMonitor};
pub use player::{
    AudioQueueStatus, ChannelState, DspDebugStatus, MusicPlayer, PlaybackMode, PlaybackState,
    PlayerConfig, SONG_ID_ADDR, STOP_COMMAND,
};
pub use resample::Resampler;
pub use sink::{AudioConfig, AudioSink, AudioStatus, SampleFormat};
pub use snes_apu::ApuStatus;
