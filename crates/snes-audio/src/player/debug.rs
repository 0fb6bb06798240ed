//! Channel views, debug snapshots and recovery actions.

use snes_apu::ApuStatus;
use sony_dsp::{EnvelopeMode, reg};

use super::MusicPlayer;
use crate::sink::{AudioSink, AudioStatus};

/// What one DSP voice is doing, for channel meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub key_on: bool,
    pub sample: u8,
    pub pitch: u16,
    /// Magnitude of the signed voice volume.
    pub volume_left: u8,
    pub volume_right: u8,
    pub gain: u8,
    pub envelope_mode: EnvelopeMode,
    pub envelope_level: u16,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            key_on: false,
            sample: 0,
            pitch: 0,
            volume_left: 0,
            volume_right: 0,
            gain: 0,
            envelope_mode: EnvelopeMode::Release,
            envelope_level: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DspDebugStatus {
    pub sample_offset: u32,
    pub frame_boundary: u32,
    pub master_volume_left: i8,
    pub master_volume_right: i8,
    pub mute: bool,
    pub reset: bool,
    pub echo_enabled: bool,
    /// EDL, in 16 ms steps.
    pub echo_delay: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioQueueStatus {
    pub status: AudioStatus,
    pub sample_rate: u32,
    pub backend: &'static str,
}

impl<S: AudioSink> MusicPlayer<S> {
    /// State of voice `channel`; defaults before the emulator exists.
    #[must_use]
    pub fn channel_state(&self, channel: usize) -> ChannelState {
        let Some(snes) = &self.snes else {
            return ChannelState::default();
        };
        if channel >= 8 {
            return ChannelState::default();
        }
        let dsp = snes.apu().dsp();
        let voice = dsp.voice_status(channel);
        ChannelState {
            key_on: voice.keyed_on,
            sample: voice.srcn,
            pitch: voice.pitch,
            volume_left: voice.volume_left.unsigned_abs(),
            volume_right: voice.volume_right.unsigned_abs(),
            gain: dsp.read(reg::voice(channel as u8, reg::GAIN)),
            envelope_mode: voice.envelope_mode,
            envelope_level: voice.envelope_level,
        }
    }

    #[must_use]
    pub fn channel_states(&self) -> [ChannelState; 8] {
        std::array::from_fn(|channel| self.channel_state(channel))
    }

    #[must_use]
    pub fn dsp_status(&self) -> DspDebugStatus {
        let Some(snes) = &self.snes else {
            return DspDebugStatus::default();
        };
        let dsp = snes.apu().dsp();
        let flg = dsp.read(reg::FLG);
        DspDebugStatus {
            sample_offset: dsp.sample_offset(),
            frame_boundary: dsp.frame_boundary(),
            master_volume_left: dsp.read(reg::MVOL_L) as i8,
            master_volume_right: dsp.read(reg::MVOL_R) as i8,
            mute: flg & 0x40 != 0,
            reset: flg & 0x80 != 0,
            echo_enabled: flg & 0x20 == 0,
            echo_delay: dsp.read(reg::EDL) & 0x0F,
        }
    }

    #[must_use]
    pub fn apu_status(&self) -> Option<ApuStatus> {
        self.snes.as_ref().map(|snes| snes.apu().status())
    }

    #[must_use]
    pub fn audio_queue_status(&self) -> AudioQueueStatus {
        AudioQueueStatus {
            status: self.sink.status(),
            sample_rate: self.sink.config().sample_rate,
            backend: self.sink.name(),
        }
    }

    pub fn clear_audio_queue(&mut self) {
        self.clear_sink();
        log::info!("player: audio queue cleared");
    }

    pub fn reset_dsp_buffer(&mut self) {
        if let Some(snes) = &mut self.snes {
            snes.apu_mut().dsp_mut().reset_sample_buffer();
            log::info!("player: DSP buffer reset");
        }
    }

    pub fn force_new_frame(&mut self) {
        if let Some(snes) = &mut self.snes {
            snes.apu_mut().dsp_mut().new_frame();
            log::info!("player: forced DSP frame");
        }
    }

    /// Stop, and redo driver setup on the next play.
    pub fn reinit_audio(&mut self) {
        self.stop();
        self.spc_initialized = false;
        self.preview_initialized = false;
        self.current_bank = None;
        log::info!("player: audio marked for reinitialisation");
    }
}
