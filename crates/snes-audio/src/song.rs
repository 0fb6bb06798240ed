//! Song, instrument and sample data the player works from.
//!
//! Songs are N-SPC sequences: a list of segments, each with eight parallel
//! tracks of notes and commands. Ticks are sequencer ticks (a quarter note
//! is 72).

/// Lowest note byte (C1).
pub const NOTE_MIN: u8 = 0x80;
/// Highest note byte (B6).
pub const NOTE_MAX: u8 = 0xC7;
pub const NOTE_TIE: u8 = 0xC8;
pub const NOTE_REST: u8 = 0xC9;

pub const OP_SET_INSTRUMENT: u8 = 0xE0;
pub const OP_TEMPO: u8 = 0xE7;

/// Tempo used when a song never sets one.
pub const DEFAULT_TEMPO: u8 = 150;

/// ARAM address of the song table.
pub const SONG_TABLE_ARAM: u16 = 0xD000;
/// ARAM page of the sample directory used by the stock driver.
pub const SAMPLE_DIRECTORY_PAGE: u8 = 0x3C;

/// DSP pitch for each note C1..B6. $1000 plays a sample at 32 kHz.
const PITCH_TABLE: [u16; 72] = [
    0x0086, 0x008E, 0x0096, 0x009F, 0x00A9, 0x00B3, 0x00BE, 0x00C9, 0x00D6, 0x00E3, 0x00F1, 0x00FF,
    0x010C, 0x011C, 0x012C, 0x013E, 0x0152, 0x0166, 0x017C, 0x0192, 0x01AC, 0x01C6, 0x01E2, 0x01FE,
    0x0218, 0x0238, 0x0258, 0x027C, 0x02A4, 0x02CC, 0x02F8, 0x0324, 0x0358, 0x038C, 0x03C4, 0x03FC,
    0x0430, 0x0470, 0x04B0, 0x04F8, 0x0548, 0x0598, 0x05F0, 0x0648, 0x06B0, 0x0718, 0x0788, 0x07F8,
    0x0860, 0x08E0, 0x0960, 0x09F0, 0x0A90, 0x0B30, 0x0BE0, 0x0C90, 0x0D60, 0x0E30, 0x0F10, 0x0FF0,
    0x10C0, 0x11C0, 0x12C0, 0x13E0, 0x1520, 0x1660, 0x17C0, 0x1920, 0x1AC0, 0x1C60, 0x1E20, 0x1FE0,
];

/// DSP pitch for a note byte. Non-notes map to $1000.
#[must_use]
pub fn note_pitch(note: u8) -> u16 {
    if (NOTE_MIN..=NOTE_MAX).contains(&note) {
        PITCH_TABLE[usize::from(note - NOTE_MIN)]
    } else {
        0x1000
    }
}

/// Sequencer ticks per second for a tempo byte.
///
/// The driver's timer 0 runs at 8 kHz with a divider of 16, so it fires
/// at 500 Hz and adds the tempo to an 8-bit accumulator each time.
#[must_use]
pub fn ticks_per_second(tempo: u8) -> f32 {
    500.0 * (f32::from(tempo) / 256.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// $80-$C7 note, $C8 tie or $C9 rest.
    pub pitch: u8,
    pub duration: u8,
}

impl Note {
    #[must_use]
    pub const fn is_note(self) -> bool {
        self.pitch >= NOTE_MIN && self.pitch <= NOTE_MAX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: u8,
    pub params: [u8; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Note(Note),
    Command(Command),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    /// Absolute tick within the segment.
    pub tick: u16,
    pub kind: EventKind,
}

impl TrackEvent {
    #[must_use]
    pub const fn note(tick: u16, pitch: u8, duration: u8) -> Self {
        Self {
            tick,
            kind: EventKind::Note(Note { pitch, duration }),
        }
    }

    #[must_use]
    pub const fn command(tick: u16, opcode: u8, params: [u8; 3]) -> Self {
        Self {
            tick,
            kind: EventKind::Command(Command { opcode, params }),
        }
    }

    /// The first parameter if this is a command with `opcode`.
    fn param_of(&self, opcode: u8) -> Option<u8> {
        match self.kind {
            EventKind::Command(c) if c.opcode == opcode => Some(c.params[0]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub events: Vec<TrackEvent>,
    pub duration: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub tracks: [Track; 8],
}

impl Segment {
    /// Length of the longest track.
    #[must_use]
    pub fn duration(&self) -> u16 {
        self.tracks.iter().map(|t| t.duration).max().unwrap_or(0)
    }

    /// First tempo command on channel 0.
    #[must_use]
    pub fn tempo(&self) -> Option<u8> {
        self.tracks[0]
            .events
            .iter()
            .find_map(|e| e.param_of(OP_TEMPO))
    }

    /// The instrument channel `channel` has selected at `tick`.
    #[must_use]
    pub fn instrument_at(&self, channel: usize, tick: u16) -> Option<usize> {
        let track = self.tracks.get(channel)?;
        track
            .events
            .iter()
            .take_while(|e| e.tick <= tick)
            .filter_map(|e| e.param_of(OP_SET_INSTRUMENT))
            .last()
            .map(usize::from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Song {
    pub name: String,
    pub segments: Vec<Segment>,
    /// 0 overworld, 1 dungeon, 2 credits, 3-4 expanded.
    pub bank: u8,
    /// Edited since it was read from ROM.
    pub modified: bool,
    /// ARAM image of the edited song, needed to play it when `modified`.
    pub serialized: Option<SerializedSong>,
}

impl Song {
    /// First tempo command in the first segment, on any channel.
    #[must_use]
    pub fn tempo(&self) -> u8 {
        self.segments
            .first()
            .and_then(|segment| {
                segment
                    .tracks
                    .iter()
                    .flat_map(|t| &t.events)
                    .find_map(|e| e.param_of(OP_TEMPO))
            })
            .unwrap_or(DEFAULT_TEMPO)
    }

    /// Tick at which segment `index` starts.
    #[must_use]
    pub fn segment_start(&self, index: usize) -> u32 {
        self.segments
            .iter()
            .take(index)
            .map(|s| u32::from(s.duration()))
            .sum()
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        matches!(self.bank, 3 | 4)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instrument {
    pub name: String,
    pub sample: u8,
    /// 0-15.
    pub attack: u8,
    /// 0-7.
    pub decay: u8,
    /// 0-7.
    pub sustain_level: u8,
    /// 0-31.
    pub sustain_rate: u8,
    pub gain: u8,
    /// 4.12 fixed-point pitch multiplier; $1000 is 1.0.
    pub pitch_mult: u16,
}

impl Instrument {
    /// ADSR1 with the ADSR-enable bit set.
    #[must_use]
    pub const fn adsr1(&self) -> u8 {
        0x80 | ((self.decay & 0x07) << 4) | (self.attack & 0x0F)
    }

    #[must_use]
    pub const fn adsr2(&self) -> u8 {
        ((self.sustain_level & 0x07) << 5) | (self.sustain_rate & 0x1F)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub brr: Vec<u8>,
    /// Loop start as a byte offset into `brr`.
    pub loop_offset: u16,
}

/// A song already laid out for ARAM by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedSong {
    pub base_address: u16,
    pub data: Vec<u8>,
}

/// Everything the player can be asked to play.
#[derive(Debug, Clone, Default)]
pub struct MusicBank {
    pub songs: Vec<Song>,
    pub instruments: Vec<Instrument>,
    pub samples: Vec<Sample>,
    /// The ROM carries the expanded-music patch, so banks 3 and 4 exist.
    pub expanded_patch: bool,
}

impl MusicBank {
    #[must_use]
    pub fn song(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    #[must_use]
    pub fn instrument(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    #[must_use]
    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segment_song() -> Song {
        let mut first = Segment::default();
        first.tracks[0].duration = 144;
        first.tracks[3].duration = 288;
        first.tracks[3].events = vec![
            TrackEvent::command(0, OP_TEMPO, [0x40, 0, 0]),
            TrackEvent::command(0, OP_SET_INSTRUMENT, [2, 0, 0]),
            TrackEvent::note(0, 0xA4, 72),
            TrackEvent::command(72, OP_SET_INSTRUMENT, [5, 0, 0]),
            TrackEvent::note(72, 0xA7, 72),
        ];
        let mut second = Segment::default();
        second.tracks[0].duration = 72;
        Song {
            name: "test".into(),
            segments: vec![first, second],
            bank: 0,
            modified: false,
            serialized: None,
        }
    }

    #[test]
    fn pitch_table_edges() {
        assert_eq!(note_pitch(0x80), 0x0086);
        assert_eq!(note_pitch(0xA4), 0x0430);
        assert_eq!(note_pitch(0xC7), 0x1FE0);
        assert_eq!(note_pitch(NOTE_REST), 0x1000);
    }

    #[test]
    fn tempo_to_ticks() {
        assert!((ticks_per_second(128) - 250.0).abs() < f32::EPSILON);
        assert!((ticks_per_second(DEFAULT_TEMPO) - 292.968_75).abs() < 1e-3);
    }

    #[test]
    fn song_tempo_and_segments() {
        let song = two_segment_song();
        assert_eq!(song.tempo(), 0x40);
        assert_eq!(song.segment_start(0), 0);
        assert_eq!(song.segment_start(1), 288);
        assert_eq!(song.segment_start(2), 360);
        assert_eq!(Song::default().tempo(), DEFAULT_TEMPO);
    }

    #[test]
    fn instrument_resolves_by_tick() {
        let song = two_segment_song();
        let segment = &song.segments[0];
        assert_eq!(segment.instrument_at(3, 0), Some(2));
        assert_eq!(segment.instrument_at(3, 71), Some(2));
        assert_eq!(segment.instrument_at(3, 72), Some(5));
        assert_eq!(segment.instrument_at(0, 72), None);
        assert_eq!(segment.instrument_at(9, 0), None);
    }

    #[test]
    fn adsr_packing() {
        let inst = Instrument {
            attack: 0x0F,
            decay: 0x07,
            sustain_level: 0x07,
            sustain_rate: 0x00,
            ..Instrument::default()
        };
        assert_eq!(inst.adsr1(), 0xFF);
        assert_eq!(inst.adsr2(), 0xE0);
    }
}
