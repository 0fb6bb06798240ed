//! Host audio output through cpal.
//!
//! The device callback pulls f32 samples from a lock-free ring buffer; the
//! player pushes into it from the emulation thread. Underruns play silence
//! and set a flag rather than blocking the callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Producer, Split},
};

use crate::error::SinkError;
use crate::resample::Resampler;
use crate::sink::{AudioConfig, AudioSink, AudioStatus};

/// Ring capacity in device buffers.
const RING_BUFFERS: usize = 8;

/// State shared with the device callback.
#[derive(Default)]
struct Shared {
    /// f32 bits of the output volume.
    volume: AtomicU32,
    underrun: AtomicBool,
    /// Samples pushed before the last clear. The callback skips up to here.
    flush_to: AtomicU64,
    /// Samples the callback has taken or skipped.
    consumed: AtomicU64,
}

impl Shared {
    fn restart(&self) {
        self.underrun.store(false, Ordering::Relaxed);
        self.flush_to.store(0, Ordering::Release);
        self.consumed.store(0, Ordering::Release);
    }
}

/// Producer half of the ring with a running count of pushed samples.
struct Queue {
    producer: ringbuf::HeapProd<f32>,
    pushed: u64,
}

impl Queue {
    /// Push what fits; returns the number of samples dropped.
    fn push(&mut self, samples: impl IntoIterator<Item = f32>) -> usize {
        let mut dropped = 0usize;
        for sample in samples {
            if self.producer.try_push(sample).is_ok() {
                self.pushed += 1;
            } else {
                dropped += 1;
            }
        }
        dropped
    }

    /// Mark everything pushed so far as stale. Later pushes are kept.
    fn clear(&self, shared: &Shared) {
        shared.flush_to.store(self.pushed, Ordering::Release);
    }

    /// Samples waiting that the callback will play.
    fn queued(&self, shared: &Shared) -> u64 {
        let start = shared
            .consumed
            .load(Ordering::Acquire)
            .max(shared.flush_to.load(Ordering::Acquire));
        self.pushed.saturating_sub(start)
    }
}

/// Device callback body: skip stale samples, then fill `data`.
fn fill<C: Consumer<Item = f32>>(data: &mut [f32], consumer: &mut C, shared: &Shared) {
    let mut consumed = shared.consumed.load(Ordering::Acquire);
    let flush_to = shared.flush_to.load(Ordering::Acquire);
    if consumed < flush_to {
        consumed += consumer.skip((flush_to - consumed) as usize) as u64;
    }
    let volume = f32::from_bits(shared.volume.load(Ordering::Relaxed));
    for sample in data.iter_mut() {
        *sample = match consumer.try_pop() {
            Some(value) => {
                consumed += 1;
                value * volume
            }
            None => {
                shared.underrun.store(true, Ordering::Relaxed);
                0.0
            }
        };
    }
    shared.consumed.store(consumed, Ordering::Release);
}

struct Output {
    stream: Stream,
    queue: Queue,
}

pub struct CpalSink {
    config: AudioConfig,
    output: Option<Output>,
    shared: Arc<Shared>,
    playing: bool,
    resampler: Option<Resampler>,
    scratch: Vec<i16>,
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalSink {
    #[must_use]
    pub fn new() -> Self {
        let shared = Shared::default();
        shared.volume.store(1.0f32.to_bits(), Ordering::Relaxed);
        Self {
            config: AudioConfig::default(),
            output: None,
            shared: Arc::new(shared),
            playing: false,
            resampler: None,
            scratch: Vec::new(),
        }
    }

    fn push(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        let Some(output) = &mut self.output else {
            return Err(SinkError::NotInitialized);
        };
        let dropped = output
            .queue
            .push(samples.iter().map(|&sample| f32::from(sample) / 32768.0));
        if dropped > 0 {
            log::warn!("cpal sink: ring full, dropped {dropped} samples");
        }
        Ok(())
    }
}

impl AudioSink for CpalSink {
    fn initialize(&mut self, config: &AudioConfig) -> Result<(), SinkError> {
        config.validate()?;
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SinkError::NoDevice)?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = config.buffer_frames as usize * usize::from(config.channels) * RING_BUFFERS;
        let ring = HeapRb::<f32>::new(capacity.max(2));
        let (producer, mut consumer) = ring.split();
        let mut queue = Queue {
            producer,
            pushed: 0,
        };
        // The old stream is gone before its counters restart.
        self.output = None;
        self.shared.restart();
        // One device buffer of silence so the first callback has data.
        let prefill = config.buffer_frames as usize * usize::from(config.channels);
        queue.push(std::iter::repeat_n(0.0, prefill));

        let shared = Arc::clone(&self.shared);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill(data, &mut consumer, &shared);
                },
                |err| log::error!("cpal sink: stream error: {err}"),
                None,
            )
            .map_err(|e| SinkError::Stream(e.to_string()))?;
        stream
            .pause()
            .map_err(|e| SinkError::Stream(e.to_string()))?;

        log::info!(
            "cpal sink: {} at {} Hz, ring of {} samples",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            config.sample_rate,
            capacity
        );
        self.config = *config;
        if let Some(native) = self.resampler.as_ref().map(|r| r.rates().0) {
            self.resampler = Some(Resampler::new(native, config.sample_rate));
        }
        self.output = Some(Output { stream, queue });
        self.playing = false;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.output = None;
        self.playing = false;
    }

    fn is_initialized(&self) -> bool {
        self.output.is_some()
    }

    fn play(&mut self) {
        if let Some(output) = &self.output {
            match output.stream.play() {
                Ok(()) => self.playing = true,
                Err(e) => log::error!("cpal sink: failed to start stream: {e}"),
            }
        }
    }

    fn pause(&mut self) {
        if let Some(output) = &self.output {
            if let Err(e) = output.stream.pause() {
                log::error!("cpal sink: failed to pause stream: {e}");
            }
        }
        self.playing = false;
    }

    fn stop(&mut self) {
        self.pause();
    }

    fn clear(&mut self) {
        if let Some(output) = &self.output {
            output.queue.clear(&self.shared);
        }
        self.shared.underrun.store(false, Ordering::Relaxed);
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
    }

    fn queue_samples(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        self.push(samples)
    }

    fn queue_samples_native(
        &mut self,
        samples: &[i16],
        frames: usize,
        native_rate: u32,
    ) -> Result<(), SinkError> {
        let samples = &samples[..(frames * 2).min(samples.len())];
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let converted = match &mut self.resampler {
            Some(resampler) if resampler.rates().0 == native_rate => {
                resampler.process(samples, &mut scratch);
                true
            }
            _ if native_rate == self.config.sample_rate => false,
            _ => {
                self.scratch = scratch;
                return Err(SinkError::RateMismatch {
                    native: native_rate,
                    device: self.config.sample_rate,
                });
            }
        };
        let result = if converted {
            self.push(&scratch)
        } else {
            self.push(samples)
        };
        self.scratch = scratch;
        result
    }

    fn status(&self) -> AudioStatus {
        let queued = self
            .output
            .as_ref()
            .map_or(0, |output| output.queue.queued(&self.shared));
        let frames = (queued / 2) as u32;
        AudioStatus {
            playing: self.playing,
            queued_frames: frames,
            queued_bytes: frames * 2 * self.config.format.bytes() as u32,
            underrun: self.shared.underrun.load(Ordering::Relaxed),
        }
    }

    fn config(&self) -> AudioConfig {
        self.config
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume.load(Ordering::Relaxed))
    }

    fn supports_resampling(&self) -> bool {
        true
    }

    fn set_resampling(&mut self, enabled: bool, native_rate: u32) {
        self.resampler = enabled.then(|| Resampler::new(native_rate, self.config.sample_rate));
    }

    fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize) -> (Queue, ringbuf::HeapCons<f32>, Shared) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let shared = Shared::default();
        shared.volume.store(1.0f32.to_bits(), Ordering::Relaxed);
        (
            Queue {
                producer,
                pushed: 0,
            },
            consumer,
            shared,
        )
    }

    #[test]
    fn samples_queued_after_clear_survive() {
        let (mut queue, mut consumer, shared) = ring(64);
        queue.push([0.1; 8]);
        queue.clear(&shared);
        queue.push([0.5, -0.5, 0.25, -0.25]);
        assert_eq!(queue.queued(&shared), 4);

        let mut data = [1.0f32; 4];
        fill(&mut data, &mut consumer, &shared);
        assert_eq!(data, [0.5, -0.5, 0.25, -0.25]);
        assert!(!shared.underrun.load(Ordering::Relaxed));
        assert_eq!(queue.queued(&shared), 0);
    }

    #[test]
    fn clear_after_partial_playback_skips_only_the_rest() {
        let (mut queue, mut consumer, shared) = ring(64);
        queue.push([0.1, 0.2, 0.3, 0.4]);
        let mut data = [0.0f32; 2];
        fill(&mut data, &mut consumer, &shared);
        assert_eq!(data, [0.1, 0.2]);

        queue.clear(&shared);
        queue.push([0.9, 0.8]);
        let mut data = [0.0f32; 4];
        fill(&mut data, &mut consumer, &shared);
        assert_eq!(data, [0.9, 0.8, 0.0, 0.0]);
        assert!(shared.underrun.load(Ordering::Relaxed));
    }

    #[test]
    fn volume_scales_output() {
        let (mut queue, mut consumer, shared) = ring(8);
        shared.volume.store(0.5f32.to_bits(), Ordering::Relaxed);
        queue.push([1.0, -1.0]);
        let mut data = [0.0f32; 2];
        fill(&mut data, &mut consumer, &shared);
        assert_eq!(data, [0.5, -0.5]);
    }

    #[test]
    fn full_ring_drops_and_counts() {
        let (mut queue, _consumer, shared) = ring(4);
        assert_eq!(queue.push([0.0; 6]), 2);
        assert_eq!(queue.queued(&shared), 4);
    }
}
