//! The music playback pipeline.
//!
//! [`MusicPlayer`] owns an emulated SNES and an [`AudioSink`]. It uploads
//! the sound driver and song banks into ARAM, starts songs through the APU
//! mailbox, and once per host frame runs one frame of APU cycles and hands
//! the DSP's samples to the sink.
//!
//! Two ways to start a song:
//! - direct: the driver is started without the game (IPL skipped), the
//!   song bank is uploaded and `(song, trigger)` is written to ports 0-1;
//! - game: the song id is written to WRAM $7E012C and the game's own code
//!   talks to the APU while full frames run.
//!
//! ```text
//!            play_song / play_song_direct        pause
//!   Stopped ───────────────────────────▶ Playing ──────▶ Paused
//!      ▲          preview_*                  ▲   ◀──────   │
//!      │    ─────────────────▶ Previewing    │   resume    │
//!      └──────────── stop (from any state) ──┴─────────────┘
//! ```

mod debug;
mod preview;

use std::time::Instant;

use emu_snes::{ExperimentFlags, Snes, SnesConfig, SnesRegion};
use sony_dsp::{Interpolation, SAMPLE_RATE};

use crate::bank;
use crate::error::{PlayerError, SinkError};
use crate::liveness::LivenessMonitor;
use crate::resample::Resampler;
use crate::sink::{AudioConfig, AudioSink};
use crate::song::{self, MusicBank};

pub use debug::{AudioQueueStatus, ChannelState, DspDebugStatus};

/// WRAM byte holding the game's current song id (1-based).
pub const SONG_ID_ADDR: u32 = 0x7E_012C;

/// Mailbox command that stops the driver.
pub const STOP_COMMAND: (u8, u8) = (0x00, 0xFF);

/// Songs in the stock banks; expanded songs are numbered after these.
const VANILLA_SONG_COUNT: u8 = 34;

/// Playback pipeline settings.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// ROM offsets of the sound banks: 0 is the driver, samples and
    /// instruments; 1-3 the overworld, dungeon and credits songs; 4-5 the
    /// expanded overworld banks.
    pub bank_offsets: [u32; 6],
    /// ARAM address the driver starts at.
    pub driver_entry: u16,
    /// APU cycles run after starting the driver.
    pub reset_cycles: u64,
    /// APU cycles run after triggering a song.
    pub init_cycles: u64,
    /// APU cycles run after the stop command.
    pub stop_cycles: u64,
    /// APU cycles run after keying a preview note.
    pub preview_cycles: u64,
    /// Frames of silence queued ahead of a new song.
    pub prime_frames: usize,
    /// Start songs directly through the mailbox instead of via the game.
    pub direct_spc: bool,
    pub interpolation: Interpolation,
    pub region: SnesRegion,
    pub audio: AudioConfig,
    pub experiments: ExperimentFlags,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            bank_offsets: [0x0C_8000, 0x0D_1EF5, 0x0D_8000, 0x0D_5380, 0x1A_9EF5, 0x1A_CCA7],
            driver_entry: 0x0800,
            reset_cycles: 32_000,
            init_cycles: 32_000,
            stop_cycles: 8_000,
            preview_cycles: 8_000,
            prime_frames: 6,
            direct_spc: true,
            interpolation: Interpolation::default(),
            region: SnesRegion::Ntsc,
            audio: AudioConfig::default(),
            experiments: ExperimentFlags::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    #[default]
    Stopped,
    Playing,
    Paused,
    Previewing,
}

impl PlaybackMode {
    /// Playing or previewing: frames run and audio flows.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Previewing)
    }
}

/// Snapshot for transport controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub song: Option<usize>,
    pub current_tick: u32,
    pub segment: usize,
    pub playback_speed: f32,
    pub ticks_per_second: f32,
}

/// Per-session timing and bookkeeping.
#[derive(Debug, Clone)]
struct Session {
    song: Option<usize>,
    start_time: Instant,
    start_tick: u32,
    segment: usize,
    ticks_per_second: f32,
    last_frame: Instant,
    /// Audio frames run this session, for logging cadence.
    frames: u64,
    /// APU cycle count and time at the last rate log.
    rate_mark: (u64, Instant),
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            song: None,
            start_time: now,
            start_tick: 0,
            segment: 0,
            ticks_per_second: 0.0,
            last_frame: now,
            frames: 0,
            rate_mark: (0, now),
        }
    }

    fn restart(&mut self, song: Option<usize>, start_tick: u32, segment: usize, tempo: u8) {
        let now = Instant::now();
        self.song = song;
        self.start_time = now;
        self.start_tick = start_tick;
        self.segment = segment;
        self.ticks_per_second = song::ticks_per_second(tempo);
        self.last_frame = now;
    }

    fn tick_at(&self, now: Instant, active: bool) -> u32 {
        if !active {
            return self.start_tick;
        }
        let elapsed = now.saturating_duration_since(self.start_time).as_secs_f32();
        self.start_tick + (elapsed * self.ticks_per_second) as u32
    }
}

type ExclusivityCallback = Box<dyn FnMut(bool)>;

pub struct MusicPlayer<S: AudioSink> {
    config: PlayerConfig,
    rom: Option<Vec<u8>>,
    music: MusicBank,
    snes: Option<Snes>,
    sink: S,
    mode: PlaybackMode,
    session: Session,
    /// Driver uploaded and running.
    spc_initialized: bool,
    /// APU set up for raw DSP previews (driver not running).
    preview_initialized: bool,
    /// Song bank now in ARAM.
    current_bank: Option<u8>,
    /// Run only the APU each frame rather than the whole system.
    audio_focus: bool,
    trigger: u8,
    liveness: LivenessMonitor,
    exclusivity: Option<ExclusivityCallback>,
    frame_buffer: Vec<i16>,
    /// Rate converter for sinks that cannot resample themselves.
    resampler: Option<Resampler>,
    resample_buffer: Vec<i16>,
}

impl<S: AudioSink> MusicPlayer<S> {
    #[must_use]
    pub fn new(config: PlayerConfig, sink: S) -> Self {
        Self {
            config,
            rom: None,
            music: MusicBank::default(),
            snes: None,
            sink,
            mode: PlaybackMode::Stopped,
            session: Session::new(Instant::now()),
            spc_initialized: false,
            preview_initialized: false,
            current_bank: None,
            audio_focus: false,
            trigger: 0,
            liveness: LivenessMonitor::new(),
            exclusivity: None,
            frame_buffer: Vec::new(),
            resampler: None,
            resample_buffer: Vec::new(),
        }
    }

    /// Use `rom` for the driver, banks and game code. Any running session
    /// is stopped and the emulator is rebuilt on next use.
    pub fn set_rom(&mut self, rom: Vec<u8>) {
        self.stop();
        self.rom = Some(rom);
        self.snes = None;
        self.spc_initialized = false;
        self.preview_initialized = false;
        self.current_bank = None;
    }

    pub fn set_music_bank(&mut self, music: MusicBank) {
        self.music = music;
    }

    #[must_use]
    pub fn music_bank(&self) -> &MusicBank {
        &self.music
    }

    /// Called with `true` when playback starts and `false` when it ends, so
    /// the host can silence other audio.
    pub fn set_exclusivity_callback(&mut self, callback: impl FnMut(bool) + 'static) {
        self.exclusivity = Some(Box::new(callback));
    }

    #[must_use]
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[must_use]
    pub fn snes(&self) -> Option<&Snes> {
        self.snes.as_ref()
    }

    pub fn snes_mut(&mut self) -> Option<&mut Snes> {
        self.snes.as_mut()
    }

    #[must_use]
    pub const fn mode(&self) -> PlaybackMode {
        self.mode
    }

    #[must_use]
    pub fn is_audio_ready(&self) -> bool {
        self.rom.is_some()
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.mode.is_active(),
            is_paused: self.mode == PlaybackMode::Paused,
            song: self.session.song,
            current_tick: self.current_playback_tick(),
            segment: self.session.segment,
            playback_speed: 1.0,
            ticks_per_second: self.session.ticks_per_second,
        }
    }

    /// Sequencer tick reached, extrapolated from wall time while active.
    #[must_use]
    pub fn current_playback_tick(&self) -> u32 {
        self.session.tick_at(Instant::now(), self.mode.is_active())
    }

    fn transition_to(&mut self, mode: PlaybackMode) {
        let old = self.mode;
        if old == mode {
            return;
        }
        self.mode = mode;
        if let Some(callback) = &mut self.exclusivity {
            if mode.is_active() && !old.is_active() {
                log::info!("player: requesting exclusive audio");
                callback(true);
            } else if !mode.is_active() && old.is_active() {
                log::info!("player: releasing exclusive audio");
                callback(false);
            }
        }
        log::debug!("player: {old:?} -> {mode:?}");
    }

    fn rom(&self) -> Result<&[u8], PlayerError> {
        self.rom.as_deref().ok_or(PlayerError::NoRom)
    }

    /// Build the emulator and sink on first use, then make sure the driver
    /// is running.
    pub fn ensure_audio_ready(&mut self) -> Result<(), PlayerError> {
        let Some(rom) = &self.rom else {
            log::warn!("player: no ROM loaded");
            return Err(PlayerError::NoRom);
        };

        if self.snes.is_none() {
            log::info!("player: starting emulator for audio playback");
            let config = SnesConfig {
                rom_data: rom.clone(),
                region: self.config.region,
                experiments: self.config.experiments,
            };
            self.snes = Some(Snes::new(&config)?);
        }

        if !self.sink.is_initialized() {
            self.sink.initialize(&self.config.audio)?;
        }
        let device = self.sink.config();
        log::info!(
            "player: sink {} at {} Hz, {} channels",
            self.sink.name(),
            device.sample_rate,
            device.channels
        );
        self.configure_resampling();

        if !self.spc_initialized {
            self.initialize_direct_spc()?;
        }

        let interpolation = self.config.interpolation;
        self.snes_mut_or_err()?
            .apu_mut()
            .dsp_mut()
            .set_interpolation(interpolation);
        Ok(())
    }

    /// Resample in the sink when it can, otherwise in the pipeline when the
    /// device is not at the DSP rate.
    fn configure_resampling(&mut self) {
        let device_rate = self.sink.config().sample_rate;
        if self.sink.supports_resampling() {
            self.sink.set_resampling(true, SAMPLE_RATE);
            self.resampler = None;
        } else if device_rate == SAMPLE_RATE {
            self.resampler = None;
        } else if self
            .resampler
            .as_ref()
            .is_none_or(|r| r.rates() != (SAMPLE_RATE, device_rate))
        {
            log::info!("player: sink cannot resample, converting {SAMPLE_RATE} Hz to {device_rate} Hz");
            self.resampler = Some(Resampler::new(SAMPLE_RATE, device_rate));
        }
    }

    /// Empty the sink queue and forget pipeline resampler history.
    fn clear_sink(&mut self) {
        self.sink.clear();
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
    }

    fn snes_mut_or_err(&mut self) -> Result<&mut Snes, PlayerError> {
        self.snes.as_mut().ok_or(PlayerError::NoRom)
    }

    /// Reset the APU, upload the driver bank and start it without the IPL
    /// handshake.
    fn initialize_direct_spc(&mut self) -> Result<(), PlayerError> {
        log::info!("player: initialising direct SPC playback");
        self.preview_initialized = false;
        self.snes_mut_or_err()?.apu_mut().reset();
        self.upload_sound_bank(0)?;

        let entry = self.config.driver_entry;
        let cycles = self.config.reset_cycles;
        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.bootstrap_direct(entry);
        apu.run_cycles(cycles);

        self.spc_initialized = true;
        self.current_bank = None;
        self.liveness.reset();
        Ok(())
    }

    /// ROM offset of sound bank `bank`; unknown banks fall back to bank 0.
    #[must_use]
    pub fn bank_rom_offset(&self, bank: u8) -> u32 {
        let offsets = &self.config.bank_offsets;
        offsets
            .get(usize::from(bank))
            .copied()
            .unwrap_or(offsets[0])
    }

    /// Upload every block of ROM sound bank `bank` into ARAM.
    pub fn upload_sound_bank(&mut self, bank: u8) -> Result<(), PlayerError> {
        let offset = self.bank_rom_offset(bank);
        let rom = self.rom()?;
        let Some(data) = rom.get(offset as usize..) else {
            return Err(PlayerError::UnknownBank { bank, offset });
        };
        let data = data.to_vec();
        log::info!("player: uploading sound bank {bank} from ROM ${offset:06X}");
        let summary = bank::upload(self.snes_mut_or_err()?.apu_mut(), &data);
        log::debug!(
            "player: bank {bank}: {} blocks, {} bytes",
            summary.blocks,
            summary.bytes
        );
        Ok(())
    }

    /// Copy raw song data into ARAM at `addr`.
    pub fn upload_song_to_aram(&mut self, data: &[u8], addr: u16) -> Result<(), PlayerError> {
        self.snes_mut_or_err()?.apu_mut().upload(addr, data);
        Ok(())
    }

    /// Play song `index` (0-based) using the configured start method.
    pub fn play_song(&mut self, index: usize) -> Result<(), PlayerError> {
        if self.rom.is_none() {
            log::warn!("player: no ROM loaded, cannot play song {index}");
            return Err(PlayerError::NoRom);
        }
        if self.mode != PlaybackMode::Stopped {
            self.stop();
        }
        if self.config.direct_spc {
            return self.play_song_direct(index + 1);
        }

        self.ensure_audio_ready()?;
        self.audio_focus = false;
        self.prime_silence()?;
        if !self.sink.status().playing {
            self.sink.play();
        }

        self.snes_mut_or_err()?
            .write(SONG_ID_ADDR, (index + 1) as u8);

        let tempo = self.music.song(index).map_or(song::DEFAULT_TEMPO, song::Song::tempo);
        self.session.restart(Some(index), 0, 0, tempo);
        self.transition_to(PlaybackMode::Playing);
        Ok(())
    }

    /// Start song `song_id` (1-based) through the driver mailbox.
    pub fn play_song_direct(&mut self, song_id: usize) -> Result<(), PlayerError> {
        self.rom()?;
        if self.mode != PlaybackMode::Stopped {
            self.stop();
        }
        if self.preview_initialized {
            self.initialize_direct_spc()?;
        }
        self.ensure_audio_ready()?;

        let index = song_id.checked_sub(1).ok_or(PlayerError::UnknownSong(0))?;
        let song = self
            .music
            .song(index)
            .ok_or(PlayerError::UnknownSong(index))?;
        if song.modified {
            return self.preview_custom_song(index);
        }

        let expanded = song.is_expanded();
        let mut song_bank = song.bank;
        let tempo = song.tempo();
        log::info!(
            "player: song {song_id} ({}) from bank {song_bank}",
            song.name
        );

        if self.current_bank != Some(song_bank) {
            let mut rom_bank = song_bank + 1;
            if expanded && !self.music.expanded_patch {
                log::warn!("player: expanded bank {song_bank} without the patch, using bank 0");
                rom_bank = 1;
                song_bank = 0;
            }
            self.upload_sound_bank(rom_bank)?;
            self.current_bank = Some(song_bank);
        }

        let spc_index = if expanded {
            song_id.saturating_sub(usize::from(VANILLA_SONG_COUNT)) as u8
        } else {
            song_id as u8
        };
        self.trigger ^= 1;
        let trigger = self.trigger;
        let init_cycles = self.config.init_cycles;
        let apu = self.snes_mut_or_err()?.apu_mut();
        apu.write_port(0, spc_index);
        apu.write_port(1, trigger);
        apu.run_cycles(init_cycles);

        self.clear_sink();
        self.start_audio_frames()?;
        self.prime_silence()?;
        self.sink.play();

        self.session.restart(Some(index), 0, 0, tempo);
        self.transition_to(PlaybackMode::Playing);
        Ok(())
    }

    /// Queue `prime_frames` frames of native-rate silence.
    fn prime_silence(&mut self) -> Result<(), PlayerError> {
        let frames = self.config.region.wanted_samples() * self.config.prime_frames;
        let silence = vec![0i16; frames * 2];
        self.queue_native(&silence, frames)
    }

    /// Fresh DSP buffer, one frame of APU output queued, frame timing reset.
    fn start_audio_frames(&mut self) -> Result<(), PlayerError> {
        self.audio_focus = true;
        let snes = self.snes_mut_or_err()?;
        snes.apu_mut().dsp_mut().reset_sample_buffer();
        snes.run_audio_frame();
        snes.reset_timing();
        self.session.last_frame = Instant::now();
        self.session.frames = 0;
        self.liveness.reset();
        self.push_frame()
    }

    /// Shared tail of every preview entry point.
    fn prepare_audio_playback(&mut self) -> Result<(), PlayerError> {
        let device = self.sink.config();
        log::info!(
            "player: preparing playback on {} at {} Hz, resampling {}",
            self.sink.name(),
            device.sample_rate,
            if self.sink.is_resampling() { "on" } else { "off" }
        );
        self.start_audio_frames()?;
        self.sink.play();
        Ok(())
    }

    /// Pull the last DSP frame and queue it.
    fn push_frame(&mut self) -> Result<(), PlayerError> {
        let snes = self.snes.as_ref().ok_or(PlayerError::NoRom)?;
        let wanted = snes.wanted_samples();
        let mut buffer = std::mem::take(&mut self.frame_buffer);
        buffer.resize(wanted * 2, 0);
        snes.set_samples(&mut buffer, wanted);
        let result = self.queue_native(&buffer, wanted);
        self.frame_buffer = buffer;
        result
    }

    /// Queue native-rate samples. Converts them here when the sink cannot,
    /// and turns sink resampling back on once if the sink refuses them.
    fn queue_native(&mut self, samples: &[i16], frames: usize) -> Result<(), PlayerError> {
        if let Some(resampler) = &mut self.resampler {
            let samples = &samples[..(frames * 2).min(samples.len())];
            let mut out = std::mem::take(&mut self.resample_buffer);
            out.clear();
            out.reserve(resampler.output_frames(samples.len() / 2) * 2);
            resampler.process(samples, &mut out);
            let result = self.sink.queue_samples(&out).map_err(PlayerError::from);
            self.resample_buffer = out;
            return result;
        }
        match self.sink.queue_samples_native(samples, frames, SAMPLE_RATE) {
            Err(SinkError::RateMismatch { .. }) if self.sink.supports_resampling() => {
                log::warn!("player: sink refused native samples, re-enabling resampling");
                self.sink.set_resampling(true, SAMPLE_RATE);
                self.sink
                    .queue_samples_native(samples, frames, SAMPLE_RATE)
                    .map_err(PlayerError::from)
            }
            other => other.map_err(PlayerError::from),
        }
    }

    /// Run at most one frame if a frame period has passed since the last.
    pub fn update(&mut self) -> Result<(), PlayerError> {
        self.update_at(Instant::now())
    }

    /// [`MusicPlayer::update`] with an explicit clock.
    pub fn update_at(&mut self, now: Instant) -> Result<(), PlayerError> {
        if self.mode.is_active() && self.snes.is_some() {
            if self.sink.supports_resampling() && !self.sink.is_resampling() {
                log::error!("player: resampling was disabled during playback, re-enabling");
                self.sink.set_resampling(true, SAMPLE_RATE);
            }

            let frame_period = self.config.region.frame_period();
            let elapsed = now
                .saturating_duration_since(self.session.last_frame)
                .as_secs_f64();
            if elapsed >= frame_period {
                self.session.last_frame = now;
                self.run_one_frame(now, elapsed)?;
            }
        }

        if !self.config.direct_spc {
            self.poll_game_song();
        }
        Ok(())
    }

    fn run_one_frame(&mut self, now: Instant, elapsed: f64) -> Result<(), PlayerError> {
        let frame = self.session.frames;
        self.session.frames += 1;
        if frame < 5 || frame % 300 == 0 {
            log::info!(
                "player: frame {frame} ({})",
                if self.audio_focus { "audio only" } else { "full system" }
            );
        }
        if frame % 60 == 59 {
            log::debug!(
                "player: {:.2} fps against {:.2} target",
                1.0 / elapsed,
                self.config.region.field_rate()
            );
        }

        let audio_focus = self.audio_focus;
        let frame_period = self.config.region.frame_period();
        let snes = self.snes_mut_or_err()?;
        if audio_focus {
            snes.run_audio_frame();
        } else {
            snes.run_frame();
        }
        let pc = snes.apu().pc();
        let apu_cycles = snes.apu().cycles();
        self.push_frame()?;

        if frame % 60 == 59 {
            self.log_apu_rate(apu_cycles, now);
        }

        if let Err(fault) = self.liveness.observe(pc, frame_period) {
            log::error!("player: {fault}");
            self.stop();
            return Err(fault.into());
        }
        Ok(())
    }

    fn log_apu_rate(&mut self, apu_cycles: u64, now: Instant) {
        let (last_cycles, last_time) = self.session.rate_mark;
        let seconds = now.saturating_duration_since(last_time).as_secs_f64();
        if seconds > 0.0 {
            let rate = apu_cycles.saturating_sub(last_cycles) as f64 / seconds;
            log::info!(
                "player: APU {:.0} cycles/s ({:.2}x expected)",
                rate,
                rate / f64::from(snes_apu::APU_CLOCK_HZ)
            );
        }
        self.session.rate_mark = (apu_cycles, now);
        let status = self.sink.status();
        log::debug!(
            "player: sink playing={} queued={} frames / {} bytes",
            status.playing,
            status.queued_frames,
            status.queued_bytes
        );
    }

    /// Follow the game when it changes song on its own.
    fn poll_game_song(&mut self) {
        let Some(snes) = &mut self.snes else {
            return;
        };
        let id = snes.read(SONG_ID_ADDR);
        if id == 0 {
            return;
        }
        let index = usize::from(id - 1);
        if self.session.song == Some(index) {
            return;
        }
        log::debug!("player: game switched to song {id}");
        let tempo = self
            .music
            .song(index)
            .map_or(song::DEFAULT_TEMPO, song::Song::tempo);
        self.session.restart(Some(index), 0, 0, tempo);
        if self.mode == PlaybackMode::Stopped {
            self.transition_to(PlaybackMode::Playing);
        }
    }

    pub fn pause(&mut self) {
        if !self.mode.is_active() {
            return;
        }
        self.session.start_tick = self.current_playback_tick();
        self.sink.pause();
        self.transition_to(PlaybackMode::Paused);
    }

    pub fn resume(&mut self) {
        if self.mode != PlaybackMode::Paused {
            return;
        }
        if let Some(snes) = &mut self.snes {
            snes.reset_timing();
        }
        self.clear_sink();
        self.sink.play();
        let now = Instant::now();
        self.session.start_time = now;
        self.session.last_frame = now;
        self.transition_to(PlaybackMode::Playing);
        log::debug!("player: resumed from tick {}", self.session.start_tick);
    }

    /// Send the stop command, let the driver see it, silence the sink.
    pub fn stop(&mut self) {
        if self.mode == PlaybackMode::Stopped {
            return;
        }
        if let Some(snes) = &mut self.snes {
            let apu = snes.apu_mut();
            apu.write_port(0, STOP_COMMAND.0);
            apu.write_port(1, STOP_COMMAND.1);
            apu.run_cycles(self.config.stop_cycles);
        }
        self.audio_focus = false;
        self.sink.stop();
        self.clear_sink();

        // The song index survives for toggle_play_pause.
        self.session.start_tick = 0;
        self.session.segment = 0;
        self.session.ticks_per_second = 0.0;
        self.transition_to(PlaybackMode::Stopped);
        log::debug!("player: stopped");
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), PlayerError> {
        match self.mode {
            PlaybackMode::Playing | PlaybackMode::Previewing => self.pause(),
            PlaybackMode::Paused => self.resume(),
            PlaybackMode::Stopped => {
                if let Some(index) = self.session.song {
                    self.play_song(index)?;
                }
            }
        }
        Ok(())
    }

    /// Jump the timeline to the start of segment `segment` of the playing
    /// song. The driver is not told; this only moves the displayed tick.
    pub fn seek_to_segment(&mut self, segment: usize) -> Result<(), PlayerError> {
        let index = self.session.song.ok_or(PlayerError::UnknownSong(0))?;
        let song = self.music.song(index).ok_or(PlayerError::UnknownSong(index))?;
        let Some(target) = song.segments.get(segment) else {
            return Err(PlayerError::UnknownSegment {
                song: index,
                segment,
            });
        };
        let tempo = target.tempo();
        self.session.start_time = Instant::now();
        self.session.start_tick = song.segment_start(segment);
        self.session.segment = segment;
        if let Some(tempo) = tempo {
            self.session.ticks_per_second = song::ticks_per_second(tempo);
        }
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.config.interpolation = interpolation;
        if let Some(snes) = &mut self.snes {
            snes.apu_mut().dsp_mut().set_interpolation(interpolation);
        }
    }

    /// Select interpolation by UI index.
    pub fn set_interpolation_type(&mut self, index: i32) {
        self.set_interpolation(Interpolation::from_index(index));
    }

    pub fn set_direct_spc_mode(&mut self, enabled: bool) {
        self.config.direct_spc = enabled;
    }

    #[must_use]
    pub fn is_direct_spc_mode(&self) -> bool {
        self.config.direct_spc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffered::BufferedSink;

    #[test]
    fn nothing_plays_without_a_rom() {
        let mut player = MusicPlayer::new(PlayerConfig::default(), BufferedSink::new());
        assert!(!player.is_audio_ready());
        assert!(matches!(player.play_song(0), Err(PlayerError::NoRom)));
        assert!(matches!(player.ensure_audio_ready(), Err(PlayerError::NoRom)));
        assert_eq!(player.mode(), PlaybackMode::Stopped);
    }

    #[test]
    fn transport_is_idle_when_stopped() {
        let mut player = MusicPlayer::new(PlayerConfig::default(), BufferedSink::new());
        player.pause();
        player.resume();
        player.stop();
        assert!(player.toggle_play_pause().is_ok());
        assert_eq!(player.mode(), PlaybackMode::Stopped);
        let state = player.state();
        assert!(!state.is_playing && !state.is_paused);
        assert_eq!(state.song, None);
        assert!((state.playback_speed - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn bank_offsets_fall_back_to_bank_zero() {
        let player = MusicPlayer::new(PlayerConfig::default(), BufferedSink::new());
        assert_eq!(player.bank_rom_offset(2), 0x0D_8000);
        assert_eq!(player.bank_rom_offset(6), 0x0C_8000);
    }

    #[test]
    fn volume_is_clamped() {
        let mut player = MusicPlayer::new(PlayerConfig::default(), BufferedSink::new());
        player.set_volume(3.0);
        assert!((player.sink().volume() - 1.0).abs() < f32::EPSILON);
        player.set_volume(-1.0);
        assert!(player.sink().volume().abs() < f32::EPSILON);
    }

    #[test]
    fn session_tick_extrapolates_only_while_active() {
        let start = Instant::now();
        let mut session = Session::new(start);
        session.start_tick = 100;
        session.ticks_per_second = 250.0;
        let later = start + std::time::Duration::from_secs(2);
        assert_eq!(session.tick_at(later, true), 600);
        assert_eq!(session.tick_at(later, false), 100);
    }
}
