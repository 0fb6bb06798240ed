//! The audio sink contract.
//!
//! Samples are interleaved signed 16-bit stereo. A sink plays at its own
//! device rate; [`AudioSink::queue_samples_native`] accepts samples at the
//! emulator's native 32,040 Hz and converts them when resampling is on.

use crate::error::SinkError;

/// Sample format delivered to the device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    #[default]
    I16,
    F32,
}

impl SampleFormat {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::F32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Device rate in Hz.
    pub sample_rate: u32,
    pub channels: u16,
    /// Device buffer length in frames.
    pub buffer_frames: u32,
    pub format: SampleFormat,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            buffer_frames: 1024,
            format: SampleFormat::I16,
        }
    }
}

impl AudioConfig {
    /// Check the parts every sink relies on.
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.sample_rate == 0 {
            return Err(SinkError::UnsupportedConfig("sample rate is 0".into()));
        }
        if self.channels != 2 {
            return Err(SinkError::UnsupportedConfig(format!(
                "{} channels, only stereo is supported",
                self.channels
            )));
        }
        Ok(())
    }
}

/// Queue state reported by a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStatus {
    pub playing: bool,
    /// Frames waiting to be played, at the device rate.
    pub queued_frames: u32,
    pub queued_bytes: u32,
    /// The device ran dry since the last [`AudioSink::clear`].
    pub underrun: bool,
}

/// A real-time audio output.
pub trait AudioSink {
    /// Open the device. Safe to call again after [`AudioSink::shutdown`].
    fn initialize(&mut self, config: &AudioConfig) -> Result<(), SinkError>;

    fn shutdown(&mut self);

    fn is_initialized(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    /// Stop playback. Queued audio is kept until [`AudioSink::clear`].
    fn stop(&mut self);

    /// Drop queued audio and the underrun flag.
    fn clear(&mut self);

    /// Queue interleaved stereo samples already at the device rate.
    fn queue_samples(&mut self, samples: &[i16]) -> Result<(), SinkError>;

    /// Queue `frames` interleaved stereo frames recorded at `native_rate`.
    fn queue_samples_native(
        &mut self,
        samples: &[i16],
        frames: usize,
        native_rate: u32,
    ) -> Result<(), SinkError>;

    fn status(&self) -> AudioStatus;

    fn config(&self) -> AudioConfig;

    /// Output gain, 0.0 to 1.0.
    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    fn supports_resampling(&self) -> bool;

    /// Convert native-rate input from `native_rate` to the device rate.
    fn set_resampling(&mut self, enabled: bool, native_rate: u32);

    fn is_resampling(&self) -> bool;

    fn name(&self) -> &'static str;
}
