//! Sets of MIDI notes, and parsing notes from their names.
//!
//! Notes are identified by their MIDI key number, `0` through `127`.
//! Names use scientific pitch notation where middle C is `C4` (key `60`), so key `0` is `C-1`
//! and key `127` is `G9`.

use crate::prelude::*;
use core::str::FromStr;
use thiserror::Error as ThisError;

/// A set of MIDI notes, stored as a 128-bit mask.
///
/// ```
/// use midisolo::{num::u7, NoteSet};
///
/// let notes: NoteSet = "C4, E4, G4".parse().unwrap();
/// assert!(notes.contains(u7::new(64)));
/// assert_eq!(notes.len(), 3);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct NoteSet {
    bits: u128,
}
impl NoteSet {
    /// The empty set.
    #[inline]
    pub const fn new() -> NoteSet {
        NoteSet { bits: 0 }
    }

    /// The set of all 128 notes.
    #[inline]
    pub const fn all() -> NoteSet {
        NoteSet { bits: !0 }
    }

    /// Add a note, returning whether it was newly inserted.
    #[inline]
    pub fn insert(&mut self, note: u7) -> bool {
        let had = self.contains(note);
        self.bits |= 1 << note.as_int();
        !had
    }

    /// Remove a note, returning whether it was present.
    #[inline]
    pub fn remove(&mut self, note: u7) -> bool {
        let had = self.contains(note);
        self.bits &= !(1 << note.as_int());
        had
    }

    #[inline]
    pub fn contains(&self, note: u7) -> bool {
        self.bits & (1 << note.as_int()) != 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Every note not in this set.
    #[inline]
    pub fn complement(&self) -> NoteSet {
        NoteSet { bits: !self.bits }
    }

    /// Iterate over the notes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u7> + '_ {
        (0..128u8)
            .map(u7::new)
            .filter(move |&note| self.contains(note))
    }
}
impl FromIterator<u7> for NoteSet {
    fn from_iter<I: IntoIterator<Item = u7>>(iter: I) -> NoteSet {
        let mut set = NoteSet::new();
        set.extend(iter);
        set
    }
}
impl Extend<u7> for NoteSet {
    fn extend<I: IntoIterator<Item = u7>>(&mut self, iter: I) {
        for note in iter {
            self.insert(note);
        }
    }
}
impl fmt::Debug for NoteSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter().map(u7::as_int)).finish()
    }
}

/// Parses a comma or whitespace separated list of notes, each one in any of the forms accepted by
/// [`parse_note`].
impl FromStr for NoteSet {
    type Err = NoteParseError;
    fn from_str(s: &str) -> StdResult<NoteSet, NoteParseError> {
        s.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(parse_note)
            .collect()
    }
}

/// An error while parsing a note name.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum NoteParseError {
    #[error("empty note name")]
    Empty,
    #[error("unknown note name `{0}`")]
    UnknownName(String),
    #[error("note `{0}` is outside of the MIDI range C-1..=G9")]
    OutOfRange(String),
}

/// Parse a single note, either as a key number (`"60"`) or as a name with an optional accidental
/// and an octave (`"C4"`, `"F#3"`, `"Bb2"`, `"C-1"`).
///
/// Letters are case-insensitive, and any amount of `#` (sharp) or `b` (flat) accidentals may
/// follow the letter.
pub fn parse_note(name: &str) -> StdResult<u7, NoteParseError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NoteParseError::Empty);
    }
    if name.bytes().all(|b| b.is_ascii_digit()) {
        return name
            .parse::<u8>()
            .ok()
            .and_then(u7::try_from)
            .ok_or_else(|| NoteParseError::OutOfRange(name.to_string()));
    }

    let unknown = || NoteParseError::UnknownName(name.to_string());
    let mut chars = name.chars();
    let letter = chars.next().ok_or_else(unknown)?;
    let pitch_class: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(unknown()),
    };
    let rest = chars.as_str();
    let octave_start = rest
        .find(|c: char| c == '-' || c.is_ascii_digit())
        .ok_or_else(unknown)?;
    let (accidentals, octave) = rest.split_at(octave_start);
    let mut shift = 0;
    for acc in accidentals.chars() {
        match acc {
            '#' => shift += 1,
            'b' => shift -= 1,
            _ => return Err(unknown()),
        }
    }
    let octave = octave.parse::<i32>().map_err(|_| unknown())?;
    let key = octave
        .checked_add(1)
        .and_then(|o| o.checked_mul(12))
        .and_then(|base| base.checked_add(pitch_class + shift))
        .ok_or_else(|| NoteParseError::OutOfRange(name.to_string()))?;
    u8::try_from(key)
        .ok()
        .and_then(u7::try_from)
        .ok_or_else(|| NoteParseError::OutOfRange(name.to_string()))
}
