//! The S-DSP: register file, eight voices, noise, echo and the output mix.

use crate::buffer::SampleBuffer;
use crate::envelope::{EnvelopeMode, EnvelopeRegs, RateCounter};
use crate::voice::{Interpolation, Voice};
use crate::{Aram, reg};

/// Snapshot of one voice for debug displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStatus {
    pub keyed_on: bool,
    pub srcn: u8,
    /// 14-bit pitch; $1000 plays at the native rate.
    pub pitch: u16,
    pub volume_left: i8,
    pub volume_right: i8,
    pub envelope_level: u16,
    pub envelope_mode: EnvelopeMode,
    pub block_addr: u16,
}

pub struct Dsp {
    regs: [u8; 128],
    voices: [Voice; 8],
    counter: RateCounter,
    noise: u16,
    /// Byte offset of the next echo frame inside the echo buffer.
    echo_pos: u16,
    /// Last eight echo samples read back, oldest first.
    echo_history: [[i32; 2]; 8],
    /// KON bits written since the last sample.
    kon_pending: u8,
    interpolation: Interpolation,
    buffer: SampleBuffer,
}

impl Default for Dsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp {
    #[must_use]
    pub fn new() -> Self {
        let mut regs = [0; 128];
        regs[usize::from(reg::FLG)] = 0xE0;
        Self {
            regs,
            voices: [const { Voice::new() }; 8],
            counter: RateCounter::new(),
            noise: 0x4000,
            echo_pos: 0,
            echo_history: [[0; 2]; 8],
            kon_pending: 0,
            interpolation: Interpolation::default(),
            buffer: SampleBuffer::new(),
        }
    }

    /// Power-on state. The sample buffer and interpolation choice survive.
    pub fn reset(&mut self) {
        self.regs = [0; 128];
        self.regs[usize::from(reg::FLG)] = 0xE0;
        self.voices = [const { Voice::new() }; 8];
        self.counter = RateCounter::new();
        self.noise = 0x4000;
        self.echo_pos = 0;
        self.echo_history = [[0; 2]; 8];
        self.kon_pending = 0;
    }

    /// Read a register. Addresses $80-$FF mirror $00-$7F.
    #[must_use]
    pub fn read(&self, addr: u8) -> u8 {
        self.regs[usize::from(addr & 0x7F)]
    }

    /// Write a register. Writes to $80-$FF are ignored.
    pub fn write(&mut self, addr: u8, value: u8) {
        if addr >= 0x80 {
            return;
        }
        match addr {
            reg::KON => self.kon_pending |= value,
            reg::ENDX => {
                // Any write acknowledges every end flag.
                self.regs[usize::from(reg::ENDX)] = 0;
                return;
            }
            _ => {}
        }
        self.regs[usize::from(addr)] = value;
    }

    fn voice_reg(&self, voice: usize, offset: u8) -> u8 {
        self.regs[voice * 0x10 + usize::from(offset)]
    }

    fn set_voice_reg(&mut self, voice: usize, offset: u8, value: u8) {
        self.regs[voice * 0x10 + usize::from(offset)] = value;
    }

    fn directory_word(&self, ram: &Aram, srcn: u8, second: bool) -> u16 {
        let base = u16::from(self.regs[usize::from(reg::DIR)]) << 8;
        let addr = base
            .wrapping_add(u16::from(srcn) * 4)
            .wrapping_add(if second { 2 } else { 0 });
        u16::from_le_bytes([
            ram[usize::from(addr)],
            ram[usize::from(addr.wrapping_add(1))],
        ])
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    #[must_use]
    pub const fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    #[must_use]
    pub fn voice_status(&self, voice: usize) -> VoiceStatus {
        let v = &self.voices[voice & 7];
        let voice = voice & 7;
        VoiceStatus {
            keyed_on: v.is_keyed_on(),
            srcn: self.voice_reg(voice, reg::SRCN),
            pitch: self.pitch(voice),
            volume_left: self.voice_reg(voice, reg::VOL_L) as i8,
            volume_right: self.voice_reg(voice, reg::VOL_R) as i8,
            envelope_level: v.envelope.level(),
            envelope_mode: v.envelope.mode(),
            block_addr: v.block_addr(),
        }
    }

    fn pitch(&self, voice: usize) -> u16 {
        u16::from_le_bytes([
            self.voice_reg(voice, reg::PITCH_L),
            self.voice_reg(voice, reg::PITCH_H),
        ]) & 0x3FFF
    }

    /// Produce one stereo output sample (every 32 APU cycles).
    pub fn cycle(&mut self, ram: &mut Aram) {
        self.counter.tick();
        let flg = self.regs[usize::from(reg::FLG)];

        if flg & 0x80 != 0 {
            for voice in &mut self.voices {
                voice.silence();
            }
        }

        let kon = std::mem::take(&mut self.kon_pending);
        if kon != 0 {
            for v in 0..8 {
                if kon & (1 << v) != 0 {
                    let start = self.directory_word(ram, self.voice_reg(v, reg::SRCN), false);
                    self.voices[v].start(start, ram);
                    self.regs[usize::from(reg::ENDX)] &= !(1 << v);
                    log::trace!("dsp: voice {v} key on at ${start:04X}");
                }
            }
        }
        let koff = self.regs[usize::from(reg::KOFF)];
        for v in 0..8 {
            if koff & (1 << v) != 0 && kon & (1 << v) == 0 {
                self.voices[v].key_off();
            }
        }

        if self.counter.due(flg & 0x1F) {
            let feedback = (self.noise << 13) ^ (self.noise << 14);
            self.noise = (feedback & 0x4000) ^ (self.noise >> 1);
        }
        let noise_sample = i32::from(((self.noise << 1) as i16) >> 1);

        let pmon = self.regs[usize::from(reg::PMON)];
        let non = self.regs[usize::from(reg::NON)];
        let eon = self.regs[usize::from(reg::EON)];
        let mut mix = [0i32; 2];
        let mut echo_mix = [0i32; 2];
        let mut previous_output = 0i32;

        for v in 0..8 {
            let bit = 1u8 << v;
            let mut pitch = i32::from(self.pitch(v));
            if v > 0 && pmon & bit != 0 {
                pitch += ((previous_output >> 5) * pitch) >> 10;
                pitch = pitch.clamp(0, 0x3FFF);
            }

            let source = if non & bit != 0 {
                noise_sample
            } else {
                self.voices[v].sample(self.interpolation)
            };
            let level = i32::from(self.voices[v].envelope.level());
            let output = (((source << 1) * level) >> 11).clamp(-0x8000, 0x7FFF) & !1;
            self.voices[v].output = output as i16;
            previous_output = output;

            self.set_voice_reg(v, reg::OUTX, (output >> 8) as u8);
            self.set_voice_reg(v, reg::ENVX, (level >> 4) as u8);

            for (side, offset) in [reg::VOL_L, reg::VOL_R].into_iter().enumerate() {
                let volume = i32::from(self.voice_reg(v, offset) as i8);
                let amount = (output * volume) >> 7;
                mix[side] = (mix[side] + amount).clamp(-0x8000, 0x7FFF);
                if eon & bit != 0 {
                    echo_mix[side] = (echo_mix[side] + amount).clamp(-0x8000, 0x7FFF);
                }
            }

            let regs = EnvelopeRegs {
                adsr1: self.voice_reg(v, reg::ADSR1),
                adsr2: self.voice_reg(v, reg::ADSR2),
                gain: self.voice_reg(v, reg::GAIN),
            };
            let voice = &mut self.voices[v];
            voice.envelope.step(regs, self.counter);

            if voice.is_keyed_on() || voice.envelope.level() != 0 {
                let srcn = self.voice_reg(v, reg::SRCN);
                let loop_addr = self.directory_word(ram, srcn, true);
                if self.voices[v].advance(pitch as u16, loop_addr, ram) {
                    self.regs[usize::from(reg::ENDX)] |= bit;
                }
            }
        }

        let echo = self.echo(ram, echo_mix, flg);

        let mut out = [0i16; 2];
        for side in 0..2 {
            let master = i32::from(self.regs[usize::from(reg::MVOL_L) + side * 0x10] as i8);
            let echo_volume = i32::from(self.regs[usize::from(reg::EVOL_L) + side * 0x10] as i8);
            let value = ((mix[side] * master) >> 7) + ((echo[side] * echo_volume) >> 7);
            out[side] = value.clamp(-0x8000, 0x7FFF) as i16;
        }
        if flg & 0x40 != 0 {
            out = [0; 2];
        }
        self.buffer.push(out[0], out[1]);
    }

    /// Run the echo unit for one sample and return its filtered output.
    fn echo(&mut self, ram: &mut Aram, input: [i32; 2], flg: u8) -> [i32; 2] {
        let start = u16::from(self.regs[usize::from(reg::ESA)]) << 8;
        let addr = start.wrapping_add(self.echo_pos);

        let read = |offset: u16| {
            let a = addr.wrapping_add(offset);
            i32::from(i16::from_le_bytes([
                ram[usize::from(a)],
                ram[usize::from(a.wrapping_add(1))],
            ])) >> 1
        };
        self.echo_history.rotate_left(1);
        self.echo_history[7] = [read(0), read(2)];

        let mut filtered = [0i32; 2];
        for (side, value) in filtered.iter_mut().enumerate() {
            let sum: i32 = self
                .echo_history
                .iter()
                .enumerate()
                .map(|(tap, sample)| {
                    let coefficient = i32::from(self.regs[0x0F + tap * 0x10] as i8);
                    (sample[side] * coefficient) >> 6
                })
                .sum();
            *value = sum.clamp(-0x8000, 0x7FFF) & !1;
        }

        if flg & 0x20 == 0 {
            let feedback = i32::from(self.regs[usize::from(reg::EFB)] as i8);
            for side in 0..2 {
                let value = (input[side] + ((filtered[side] * feedback) >> 7))
                    .clamp(-0x8000, 0x7FFF)
                    & !1;
                let [lo, hi] = (value as i16).to_le_bytes();
                let a = addr.wrapping_add(side as u16 * 2);
                ram[usize::from(a)] = lo;
                ram[usize::from(a.wrapping_add(1))] = hi;
            }
        }

        let delay = u32::from(self.regs[usize::from(reg::EDL)] & 0x0F);
        let length = if delay == 0 { 4 } else { delay * 2048 };
        let next = u32::from(self.echo_pos) + 4;
        self.echo_pos = if next >= length { 0 } else { next as u16 };
        filtered
    }

    pub fn reset_sample_buffer(&mut self) {
        self.buffer.reset();
    }

    /// Commit the samples produced so far as one video frame.
    pub fn new_frame(&mut self) {
        self.buffer.new_frame();
    }

    /// Samples written since the buffer was last reset.
    #[must_use]
    pub const fn sample_offset(&self) -> u32 {
        self.buffer.offset()
    }

    #[must_use]
    pub const fn frame_boundary(&self) -> u32 {
        self.buffer.frame_boundary()
    }

    /// Samples in the last committed frame.
    #[must_use]
    pub fn frame_sample_count(&self) -> u32 {
        self.buffer.last_frame_len()
    }

    /// Copy the last committed frame into `out` as `wanted` interleaved
    /// stereo samples.
    pub fn get_samples(&self, out: &mut [i16], wanted: usize) {
        self.buffer.get_samples(out, wanted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIR_PAGE: u8 = 0x02;
    const SAMPLE_AT: u16 = 0x1000;

    /// ARAM with source 0 pointing at a looping full-scale square-ish block.
    fn ram_with_sample(header: u8) -> Box<Aram> {
        let mut ram = Box::new([0u8; 0x10000]);
        let dir = usize::from(DIR_PAGE) << 8;
        ram[dir..dir + 4].copy_from_slice(&[0x00, 0x10, 0x00, 0x10]);
        let at = usize::from(SAMPLE_AT);
        ram[at] = header;
        ram[at + 1..at + 9].fill(0x77);
        ram
    }

    fn play_voice_zero(dsp: &mut Dsp) {
        dsp.write(reg::FLG, 0x20);
        dsp.write(reg::DIR, DIR_PAGE);
        dsp.write(reg::MVOL_L, 0x7F);
        dsp.write(reg::MVOL_R, 0x7F);
        dsp.write(reg::VOL_L, 0x7F);
        dsp.write(reg::VOL_R, 0x7F);
        dsp.write(reg::PITCH_H, 0x10);
        dsp.write(reg::ADSR1, 0x8F);
        dsp.write(reg::ADSR2, 0xE0);
        dsp.write(reg::KON, 0x01);
    }

    #[test]
    fn power_on_flags() {
        let dsp = Dsp::new();
        assert_eq!(dsp.read(reg::FLG), 0xE0);
        assert_eq!(dsp.read(reg::FLG | 0x80), 0xE0, "upper half mirrors");
    }

    #[test]
    fn key_on_produces_sound() {
        let mut ram = ram_with_sample(0xC3);
        let mut dsp = Dsp::new();
        play_voice_zero(&mut dsp);
        for _ in 0..64 {
            dsp.cycle(&mut ram);
        }
        dsp.new_frame();
        let mut out = vec![0; 128];
        dsp.get_samples(&mut out, 64);
        assert!(out.iter().any(|&s| s != 0), "voice should be audible");
        assert!(dsp.voice_status(0).keyed_on);
        assert_ne!(dsp.read(reg::ENVX), 0);
    }

    #[test]
    fn mute_flag_silences_output() {
        let mut ram = ram_with_sample(0xC3);
        let mut dsp = Dsp::new();
        play_voice_zero(&mut dsp);
        dsp.write(reg::FLG, 0x60);
        for _ in 0..64 {
            dsp.cycle(&mut ram);
        }
        dsp.new_frame();
        let mut out = vec![1; 128];
        dsp.get_samples(&mut out, 64);
        assert!(out.iter().all(|&s| s == 0));
        assert_ne!(dsp.read(reg::ENVX), 0, "voices still run while muted");
    }

    #[test]
    fn key_off_fades_to_silence() {
        let mut ram = ram_with_sample(0xC3);
        let mut dsp = Dsp::new();
        play_voice_zero(&mut dsp);
        for _ in 0..16 {
            dsp.cycle(&mut ram);
        }
        dsp.write(reg::KOFF, 0x01);
        for _ in 0..0x800 / 8 + 2 {
            dsp.cycle(&mut ram);
        }
        let status = dsp.voice_status(0);
        assert_eq!(status.envelope_level, 0);
        assert_eq!(status.envelope_mode, EnvelopeMode::Release);
        assert!(!status.keyed_on);
    }

    #[test]
    fn end_flag_latches_endx_until_written() {
        let mut ram = ram_with_sample(0xC1);
        let mut dsp = Dsp::new();
        play_voice_zero(&mut dsp);
        for _ in 0..20 {
            dsp.cycle(&mut ram);
        }
        assert_eq!(dsp.read(reg::ENDX) & 0x01, 0x01);
        assert!(!dsp.voice_status(0).keyed_on);
        dsp.write(reg::ENDX, 0xFF);
        assert_eq!(dsp.read(reg::ENDX), 0);
    }

    #[test]
    fn soft_reset_silences_voices() {
        let mut ram = ram_with_sample(0xC3);
        let mut dsp = Dsp::new();
        play_voice_zero(&mut dsp);
        for _ in 0..8 {
            dsp.cycle(&mut ram);
        }
        dsp.write(reg::FLG, 0xA0);
        dsp.cycle(&mut ram);
        assert_eq!(dsp.voice_status(0).envelope_level, 0);
    }

    #[test]
    fn echo_writes_are_gated_by_flg() {
        let mut ram = ram_with_sample(0xC3);
        let mut dsp = Dsp::new();
        play_voice_zero(&mut dsp);
        dsp.write(reg::ESA, 0x40);
        dsp.write(reg::EDL, 0x01);
        dsp.write(reg::EON, 0x01);
        for _ in 0..64 {
            dsp.cycle(&mut ram);
        }
        assert!(ram[0x4000..0x4800].iter().all(|&b| b == 0), "echo write disabled");

        dsp.write(reg::FLG, 0x00);
        for _ in 0..64 {
            dsp.cycle(&mut ram);
        }
        assert!(ram[0x4000..0x4800].iter().any(|&b| b != 0));
    }

    #[test]
    fn sample_offset_counts_cycles_and_frames() {
        let mut ram = Box::new([0u8; 0x10000]);
        let mut dsp = Dsp::new();
        for _ in 0..534 {
            dsp.cycle(&mut ram);
        }
        assert_eq!(dsp.sample_offset(), 534);
        dsp.new_frame();
        assert_eq!(dsp.frame_boundary(), 534);
        assert_eq!(dsp.frame_sample_count(), 534);
        dsp.reset_sample_buffer();
        assert_eq!(dsp.sample_offset(), 0);
    }
}
