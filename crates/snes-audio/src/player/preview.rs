//! Previews: single notes, instruments, raw samples and edited songs.
//!
//! Note, instrument and sample previews drive the DSP directly with the
//! driver halted. Edited songs are uploaded over the song table and started
//! through the mailbox like any other song.

use sony_dsp::reg;

use super::{MusicPlayer, PlaybackMode};
use crate::error::PlayerError;
use crate::sink::AudioSink;
use crate::song::{self, EventKind, SerializedSong, TrackEvent};

/// ARAM address raw sample previews are uploaded to.
pub const PREVIEW_SAMPLE_ADDR: u16 = 0x8000;

/// APU cycles given to the DSP after keying a voice off.
const KEY_OFF_SETTLE_CYCLES: u64 = 500;

/// APU cycles run after preparing the DSP for previews.
const PREVIEW_INIT_CYCLES: u64 = 1000;

/// Note byte for C4, the reference pitch for instrument previews.
const PREVIEW_NOTE: u8 = song::NOTE_MIN + 36;

/// Voice registers for one preview note.
struct VoiceSetup {
    srcn: u8,
    pitch: u16,
    adsr1: u8,
    adsr2: u8,
    gain: Option<u8>,
}

impl<S: AudioSink> MusicPlayer<S> {
    /// Make sure the DSP is set up for direct previews.
    pub fn ensure_preview_ready(&mut self) -> Result<(), PlayerError> {
        self.ensure_audio_ready()?;
        if !self.preview_initialized {
            self.initialize_preview_mode()?;
        }
        Ok(())
    }

    /// Reset the APU, upload the sample bank and configure the DSP so notes
    /// can be keyed by hand.
    fn initialize_preview_mode(&mut self) -> Result<(), PlayerError> {
        log::info!("player: initialising preview mode");
        self.snes_mut_or_err()?.apu_mut().reset();
        self.upload_sound_bank(0)?;

        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.write_to_dsp(reg::DIR, song::SAMPLE_DIRECTORY_PAGE);
        apu.write_to_dsp(reg::KON, 0x00);
        apu.write_to_dsp(reg::KOFF, 0x00);
        apu.write_to_dsp(reg::MVOL_L, 0x7F);
        apu.write_to_dsp(reg::MVOL_R, 0x7F);
        apu.write_to_dsp(reg::EVOL_L, 0x00);
        apu.write_to_dsp(reg::EVOL_R, 0x00);
        // Echo writes off so the echo buffer cannot overwrite samples.
        apu.write_to_dsp(reg::FLG, 0x20);
        apu.run_cycles(PREVIEW_INIT_CYCLES);

        self.preview_initialized = true;
        self.current_bank = None;
        self.liveness.reset();
        Ok(())
    }

    /// Key `setup` on `voice` at full volume.
    fn key_voice(&mut self, voice: u8, setup: &VoiceSetup) -> Result<(), PlayerError> {
        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.write_to_dsp(reg::voice(voice, reg::SRCN), setup.srcn);
        apu.write_to_dsp(reg::voice(voice, reg::ADSR1), setup.adsr1);
        apu.write_to_dsp(reg::voice(voice, reg::ADSR2), setup.adsr2);
        if let Some(gain) = setup.gain {
            apu.write_to_dsp(reg::voice(voice, reg::GAIN), gain);
        }
        apu.write_to_dsp(reg::voice(voice, reg::PITCH_L), setup.pitch as u8);
        apu.write_to_dsp(reg::voice(voice, reg::PITCH_H), (setup.pitch >> 8) as u8 & 0x3F);
        apu.write_to_dsp(reg::voice(voice, reg::VOL_L), 0x7F);
        apu.write_to_dsp(reg::voice(voice, reg::VOL_R), 0x7F);
        // KOFF is level-triggered; a stale bit would release the voice again.
        apu.write_to_dsp(reg::KOFF, 0x00);
        apu.write_to_dsp(reg::KON, 1 << voice);
        Ok(())
    }

    /// Key voice 0 off and let its release run before reuse.
    fn release_voice_zero(&mut self) -> Result<(), PlayerError> {
        self.clear_sink();
        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.write_to_dsp(reg::KOFF, 0x01);
        apu.run_cycles(KEY_OFF_SETTLE_CYCLES);
        Ok(())
    }

    fn end_previous_session(&mut self) {
        if self.mode != PlaybackMode::Stopped {
            self.stop();
        }
    }

    /// Play one note event of song `song`, on `channel`, with the
    /// instrument that channel has selected at that point of `segment`.
    /// Events that are not notes are ignored.
    pub fn preview_note(
        &mut self,
        song: usize,
        segment: usize,
        channel: usize,
        event: &TrackEvent,
    ) -> Result<(), PlayerError> {
        let EventKind::Note(note) = event.kind else {
            return Ok(());
        };
        if !note.is_note() || channel >= 8 {
            return Ok(());
        }

        let tune = self.music.song(song).ok_or(PlayerError::UnknownSong(song))?;
        let instrument = tune
            .segments
            .get(segment)
            .and_then(|s| s.instrument_at(channel, event.tick))
            .and_then(|index| self.music.instrument(index));
        let setup = VoiceSetup {
            srcn: instrument.map_or(0, |i| i.sample),
            pitch: song::note_pitch(note.pitch),
            adsr1: instrument.map_or(0xFF, song::Instrument::adsr1),
            adsr2: instrument.map_or(0xE0, song::Instrument::adsr2),
            gain: None,
        };

        self.end_previous_session();
        self.ensure_audio_ready()?;
        log::debug!(
            "player: preview note ${:02X} on channel {channel}, sample {}",
            note.pitch,
            setup.srcn
        );
        self.key_voice(channel as u8, &setup)?;
        let cycles = self.config.preview_cycles;
        self.snes_mut_or_err()?.apu_mut().run_cycles(cycles);

        self.prepare_audio_playback()?;
        self.transition_to(PlaybackMode::Previewing);
        Ok(())
    }

    /// Play instrument `index` at C4 on voice 0.
    pub fn preview_instrument(&mut self, index: usize) -> Result<(), PlayerError> {
        let instrument = self
            .music
            .instrument(index)
            .ok_or(PlayerError::UnknownInstrument(index))?;
        let pitch = (u32::from(song::note_pitch(PREVIEW_NOTE)) * u32::from(instrument.pitch_mult)) >> 12;
        let setup = VoiceSetup {
            srcn: instrument.sample,
            pitch: pitch.min(0x3FFF) as u16,
            adsr1: instrument.adsr1(),
            adsr2: instrument.adsr2(),
            gain: Some(instrument.gain),
        };
        log::info!("player: preview instrument {index} ({})", instrument.name);

        self.end_previous_session();
        self.ensure_preview_ready()?;
        self.release_voice_zero()?;
        self.key_voice(0, &setup)?;

        self.prepare_audio_playback()?;
        self.transition_to(PlaybackMode::Previewing);
        Ok(())
    }

    /// Play raw BRR sample `index` at its native pitch on voice 0.
    pub fn preview_sample(&mut self, index: usize) -> Result<(), PlayerError> {
        let sample = self
            .music
            .sample(index)
            .ok_or(PlayerError::UnknownSample(index))?;
        let brr = sample.brr.clone();
        let loop_addr = PREVIEW_SAMPLE_ADDR.wrapping_add(sample.loop_offset);
        log::info!(
            "player: preview sample {index} ({}, {} bytes)",
            sample.name,
            brr.len()
        );

        self.end_previous_session();
        self.ensure_preview_ready()?;

        // Directory entry 0 points at the uploaded copy.
        let [start_lo, start_hi] = PREVIEW_SAMPLE_ADDR.to_le_bytes();
        let [loop_lo, loop_hi] = loop_addr.to_le_bytes();
        self.upload_song_to_aram(&brr, PREVIEW_SAMPLE_ADDR)?;
        self.upload_song_to_aram(
            &[start_lo, start_hi, loop_lo, loop_hi],
            u16::from(song::SAMPLE_DIRECTORY_PAGE) << 8,
        )?;

        self.release_voice_zero()?;
        let setup = VoiceSetup {
            srcn: 0,
            pitch: 0x1000,
            adsr1: 0xFF,
            adsr2: 0xE0,
            gain: Some(0x7F),
        };
        self.key_voice(0, &setup)?;

        self.prepare_audio_playback()?;
        self.transition_to(PlaybackMode::Previewing);
        Ok(())
    }

    /// Play edited song `index` from its serialized image.
    pub fn preview_custom_song(&mut self, index: usize) -> Result<(), PlayerError> {
        let song = self.music.song(index).ok_or(PlayerError::UnknownSong(index))?;
        let image = song
            .serialized
            .clone()
            .ok_or(PlayerError::NotSerialized(index))?;
        let tempo = song.tempo();
        log::info!("player: preview custom song {index} ({})", song.name);

        self.end_previous_session();
        if self.preview_initialized {
            self.initialize_direct_spc()?;
        }
        self.ensure_audio_ready()?;
        self.upload_song_to_aram(&image.data, image.base_address)?;
        // The uploaded table's first entry is the song.
        let cycles = self.config.init_cycles;
        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.write_port(0, 1);
        apu.write_port(1, 0);
        apu.run_cycles(cycles);
        self.current_bank = None;

        self.prepare_audio_playback()?;
        self.session.restart(Some(index), 0, 0, tempo);
        self.transition_to(PlaybackMode::Previewing);
        Ok(())
    }

    /// Play one segment of song `song`. `image` is that segment alone,
    /// serialized as a one-segment song.
    pub fn preview_segment(
        &mut self,
        song: usize,
        segment: usize,
        image: &SerializedSong,
    ) -> Result<(), PlayerError> {
        let tune = self.music.song(song).ok_or(PlayerError::UnknownSong(song))?;
        if segment >= tune.segments.len() {
            return Err(PlayerError::UnknownSegment { song, segment });
        }
        let start_tick = tune.segment_start(segment);
        let tempo = tune.tempo();

        self.end_previous_session();
        if self.preview_initialized {
            self.initialize_direct_spc()?;
        }
        self.ensure_audio_ready()?;
        self.upload_song_to_aram(&image.data, image.base_address)?;
        self.trigger ^= 1;
        let trigger = self.trigger;
        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.write_port(0, 1);
        apu.write_port(1, trigger);
        self.current_bank = None;

        self.prepare_audio_playback()?;
        self.session.restart(Some(song), start_tick, segment, tempo);
        self.transition_to(PlaybackMode::Previewing);
        log::debug!("player: preview segment {segment} from tick {start_tick}");
        Ok(())
    }
}
