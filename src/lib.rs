//! # Overview
//!
//! `midisolo` is a lossless Standard Midi File (SMF) codec, along with a small note transform
//! engine able to solo, mute or change the velocity of a chosen set of notes.
//!
//! Decoding and re-encoding a file keeps every event, in order, with the same delta times and
//! payloads. The only thing that changes is running status, which is never used on output.
//!
//! Usage is as simple as:
//!
//! ```rust
//! use midisolo::{rewrite, Transform};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let bytes = [
//! #     b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0, 96,
//! #     b'M', b'T', b'r', b'k', 0, 0, 0, 12,
//! #     0x00, 0x90, 60, 100, 0x60, 0x80, 60, 0, 0x00, 0xFF, 0x2F, 0x00,
//! # ];
//! let mute_middle_c = Transform::mute("C4".parse()?);
//! let rewritten = rewrite(&bytes, &mute_middle_c)?;
//! # assert_eq!(rewritten[25], 0);
//! # Ok(())
//! # }
//! ```
//!
//! # About lifetimes
//!
//! The [`Smf`] struct stores references to the raw file bytes in order to avoid copying SysEx,
//! meta and unrecognized event payloads.
//! For this reason, the byte buffer must be created separately from the `Smf` structure:
//!
//! ```rust,no_run
//! use std::fs;
//! use midisolo::{Smf, Transform};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load bytes into a buffer
//! let bytes = fs::read("song.mid")?;
//!
//! // Parse bytes in a separate step
//! let mut smf = Smf::parse(&bytes)?;
//!
//! // Transform and save
//! let changed = Transform::velocity_shift("C4 E4 G4".parse()?, 20).apply(&mut smf);
//! println!("{} notes changed", changed);
//! smf.write_std(fs::File::create("song-louder.mid")?)?;
//! # Ok(())
//! # }
//! ```
//!
//! # About features
//!
//! A single optional feature is available, `parallel`, enabled by default.
//! It decodes, transforms and encodes the tracks of large files on several threads through the
//! `rayon` dependency.
//! Small files are always processed on the calling thread.
//!
//! # Logging
//!
//! Recoverable oddities in the input (unknown chunks, a header track count that does not match
//! the chunks present) are reported through `tracing` warnings and otherwise ignored.
//! Per-file summaries are emitted at the `debug` level, and per-chunk details at `trace`.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, ErrorKind, Result, ResultExt, StdResult},
        io::{IoWrap, Reader, Write, WriteCounter, WriteResult},
        primitive::{u14, u28, u4, u7},
    };
    pub(crate) use core::{fmt, mem, ops};
    pub(crate) use std::io;
    pub(crate) use tracing::{debug, trace, warn};

    pub(crate) fn bit_range<T>(val: T, range: ops::Range<u32>) -> T
    where
        T: From<u8>
            + ops::Shr<u32, Output = T>
            + ops::Shl<u32, Output = T>
            + ops::Not<Output = T>
            + ops::BitAnd<Output = T>,
    {
        let mask = !((!T::from(0)) << (range.end - range.start));
        (val >> range.start) & mask
    }
}

mod event;
pub mod io;
mod note;
mod primitive;
mod riff;
mod smf;
mod transform;

pub use crate::{
    error::{Error, ErrorKind, Result},
    event::{MetaMessage, MidiMessage, PitchBend, TrackEvent, TrackEventKind},
    note::{parse_note, NoteParseError, NoteSet},
    primitive::{Format, Fps, Timing},
    smf::{parse, write, write_std, EventIter, Header, Smf, Track, TrackIter},
    transform::{rewrite, shift_velocity, Mode, Transform},
};

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u14, u15, u28, u4, u7};
}

#[cfg(test)]
mod test;
