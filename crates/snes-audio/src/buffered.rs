//! In-memory sink for headless playback and tests.
//!
//! Behaves like a device queue: samples are appended at the device rate and
//! [`BufferedSink::drain`] plays them out. Draining more than is queued
//! while playing sets the underrun flag.

use std::collections::VecDeque;

use crate::error::SinkError;
use crate::resample::Resampler;
use crate::sink::{AudioConfig, AudioSink, AudioStatus};

pub struct BufferedSink {
    config: AudioConfig,
    initialized: bool,
    playing: bool,
    underrun: bool,
    volume: f32,
    resampler: Option<Resampler>,
    supports_resampling: bool,
    /// Interleaved stereo at the device rate, volume applied on drain.
    queue: VecDeque<i16>,
    /// Frames played by [`BufferedSink::drain`] since creation.
    played_frames: u64,
}

impl Default for BufferedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AudioConfig::default(),
            initialized: false,
            playing: false,
            underrun: false,
            volume: 1.0,
            resampler: None,
            supports_resampling: true,
            queue: VecDeque::new(),
            played_frames: 0,
        }
    }

    /// A sink without a rate converter, like a plain device queue.
    #[must_use]
    pub fn without_resampling() -> Self {
        Self {
            supports_resampling: false,
            ..Self::new()
        }
    }

    /// Play up to `frames` frames, returning them with volume applied.
    /// A paused or stopped sink returns nothing.
    pub fn drain(&mut self, frames: usize) -> Vec<i16> {
        if !self.playing {
            return Vec::new();
        }
        let available = self.queue.len() / 2;
        if available < frames {
            self.underrun = true;
        }
        let take = frames.min(available) * 2;
        self.played_frames += (take / 2) as u64;
        let volume = self.volume;
        self.queue
            .drain(..take)
            .map(|s| (f32::from(s) * volume) as i16)
            .collect()
    }

    /// Everything queued, without playing it.
    #[must_use]
    pub fn queued(&self) -> Vec<i16> {
        self.queue.iter().copied().collect()
    }

    #[must_use]
    pub const fn played_frames(&self) -> u64 {
        self.played_frames
    }

    /// Seconds of audio waiting at the device rate.
    #[must_use]
    pub fn queued_seconds(&self) -> f64 {
        (self.queue.len() / 2) as f64 / f64::from(self.config.sample_rate)
    }
}

impl AudioSink for BufferedSink {
    fn initialize(&mut self, config: &AudioConfig) -> Result<(), SinkError> {
        config.validate()?;
        self.config = *config;
        self.initialized = true;
        self.queue.clear();
        if let Some(native) = self.resampler.as_ref().map(|r| r.rates().0) {
            self.resampler = Some(Resampler::new(native, config.sample_rate));
        }
        log::debug!(
            "buffered sink: {} Hz, {} frame buffer",
            config.sample_rate,
            config.buffer_frames
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.playing = false;
        self.queue.clear();
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.underrun = false;
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
    }

    fn queue_samples(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        if !self.initialized {
            return Err(SinkError::NotInitialized);
        }
        self.queue.extend(samples.iter().copied());
        Ok(())
    }

    fn queue_samples_native(
        &mut self,
        samples: &[i16],
        frames: usize,
        native_rate: u32,
    ) -> Result<(), SinkError> {
        if !self.initialized {
            return Err(SinkError::NotInitialized);
        }
        let samples = &samples[..(frames * 2).min(samples.len())];
        match &mut self.resampler {
            Some(resampler) if resampler.rates().0 == native_rate => {
                let mut out = Vec::new();
                resampler.process(samples, &mut out);
                self.queue.extend(out);
                Ok(())
            }
            _ if native_rate == self.config.sample_rate => {
                self.queue.extend(samples.iter().copied());
                Ok(())
            }
            _ => Err(SinkError::RateMismatch {
                native: native_rate,
                device: self.config.sample_rate,
            }),
        }
    }

    fn status(&self) -> AudioStatus {
        let frames = (self.queue.len() / 2) as u32;
        AudioStatus {
            playing: self.playing,
            queued_frames: frames,
            queued_bytes: frames * 2 * self.config.format.bytes() as u32,
            underrun: self.underrun,
        }
    }

    fn config(&self) -> AudioConfig {
        self.config
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn supports_resampling(&self) -> bool {
        self.supports_resampling
    }

    fn set_resampling(&mut self, enabled: bool, native_rate: u32) {
        self.resampler = (enabled && self.supports_resampling)
            .then(|| Resampler::new(native_rate, self.config.sample_rate));
    }

    fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    fn name(&self) -> &'static str {
        "buffered"
    }
}
