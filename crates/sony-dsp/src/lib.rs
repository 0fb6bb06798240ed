//! Sony S-DSP, the SNES sound generator.
//!
//! Eight voices play BRR-compressed samples from the APU's 64 KB ARAM. Each
//! voice has a 14-bit pitch, an ADSR or GAIN envelope and signed stereo
//! volume. Voices mix into a main output and an echo unit (8-tap FIR with
//! feedback, buffer in ARAM). One stereo sample is produced every 32 APU
//! cycles, which is 32,040 Hz.
//!
//! # Register map (128 registers, through $F2/$F3)
//!
//! | Addr | Register |
//! |------|----------|
//! | $x0  | Voice x volume left |
//! | $x1  | Voice x volume right |
//! | $x2  | Voice x pitch lo |
//! | $x3  | Voice x pitch hi (6 bits) |
//! | $x4  | Voice x source number |
//! | $x5  | Voice x ADSR1 |
//! | $x6  | Voice x ADSR2 |
//! | $x7  | Voice x GAIN |
//! | $x8  | Voice x ENVX (read-only) |
//! | $x9  | Voice x OUTX (read-only) |
//! | $0C/$1C | Main volume left/right |
//! | $2C/$3C | Echo volume left/right |
//! | $4C  | Key on |
//! | $5C  | Key off |
//! | $6C  | Flags: reset, mute, echo write disable, noise rate |
//! | $7C  | ENDX (write clears) |
//! | $0D  | Echo feedback |
//! | $2D  | Pitch modulation enable |
//! | $3D  | Noise enable |
//! | $4D  | Echo enable |
//! | $5D  | Sample directory page |
//! | $6D  | Echo buffer page |
//! | $7D  | Echo delay |
//! | $xF  | Echo FIR coefficient x |

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod brr;
mod buffer;
mod dsp;
mod envelope;
mod voice;

pub use buffer::{RING_SAMPLES, SampleBuffer};
pub use dsp::{Dsp, VoiceStatus};
pub use envelope::{Envelope, EnvelopeMode, EnvelopeRegs, RateCounter};
pub use voice::{Interpolation, Voice};

/// The APU's audio RAM as seen by the DSP.
pub type Aram = [u8; 0x10000];

/// Native output rate in Hz.
pub const SAMPLE_RATE: u32 = 32_040;

/// APU cycles per output sample.
pub const CYCLES_PER_SAMPLE: u32 = 32;

/// Register addresses.
pub mod reg {
    pub const VOL_L: u8 = 0x00;
    pub const VOL_R: u8 = 0x01;
    pub const PITCH_L: u8 = 0x02;
    pub const PITCH_H: u8 = 0x03;
    pub const SRCN: u8 = 0x04;
    pub const ADSR1: u8 = 0x05;
    pub const ADSR2: u8 = 0x06;
    pub const GAIN: u8 = 0x07;
    pub const ENVX: u8 = 0x08;
    pub const OUTX: u8 = 0x09;

    pub const MVOL_L: u8 = 0x0C;
    pub const MVOL_R: u8 = 0x1C;
    pub const EVOL_L: u8 = 0x2C;
    pub const EVOL_R: u8 = 0x3C;
    pub const KON: u8 = 0x4C;
    pub const KOFF: u8 = 0x5C;
    pub const FLG: u8 = 0x6C;
    pub const ENDX: u8 = 0x7C;

    pub const EFB: u8 = 0x0D;
    pub const PMON: u8 = 0x2D;
    pub const NON: u8 = 0x3D;
    pub const EON: u8 = 0x4D;
    pub const DIR: u8 = 0x5D;
    pub const ESA: u8 = 0x6D;
    pub const EDL: u8 = 0x7D;

    /// Register `offset` of voice `voice` (0-7).
    #[must_use]
    pub const fn voice(voice: u8, offset: u8) -> u8 {
        ((voice & 7) << 4) | offset
    }
}
