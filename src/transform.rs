//! Rewriting note velocities.
//!
//! A [`Transform`] pairs a [`NoteSet`] with a [`Mode`] and rewrites the velocity of every matching
//! `NoteOn` event. Everything else in the file, from delta times to meta events and `NoteOff`
//! messages, comes out untouched and in the same order.

use crate::{
    event::{MidiMessage, TrackEvent, TrackEventKind},
    note::NoteSet,
    prelude::*,
    smf::Smf,
};

/// How many events must a file have in order to transform its tracks on several threads.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 1024;

/// What to do with the `NoteOn` events of the notes in a [`Transform`]'s note set.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Mode {
    /// Silence every note *not* in the set, by setting its `NoteOn` velocity to 0.
    Solo,
    /// Silence every note in the set, by setting its `NoteOn` velocity to 0.
    Mute,
    /// Add a signed amount to the `NoteOn` velocity of every note in the set, clamping the result
    /// to `0..=127`.
    VelocityShift(i32),
}

/// A note-based rewrite of `NoteOn` velocities.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Transform {
    pub notes: NoteSet,
    pub mode: Mode,
}
impl Transform {
    #[inline]
    pub fn new(notes: NoteSet, mode: Mode) -> Transform {
        Transform { notes, mode }
    }

    /// Keep only `notes` audible.
    #[inline]
    pub fn solo(notes: NoteSet) -> Transform {
        Transform::new(notes, Mode::Solo)
    }

    /// Silence `notes`.
    #[inline]
    pub fn mute(notes: NoteSet) -> Transform {
        Transform::new(notes, Mode::Mute)
    }

    /// Shift the velocity of `notes` by `delta`.
    #[inline]
    pub fn velocity_shift(notes: NoteSet, delta: i32) -> Transform {
        Transform::new(notes, Mode::VelocityShift(delta))
    }

    /// The new velocity for a `NoteOn` of the given key, or `None` if it is left alone.
    pub fn velocity(&self, key: u7, vel: u7) -> Option<u7> {
        match self.mode {
            Mode::Solo if !self.notes.contains(key) => Some(u7::new(0)),
            Mode::Mute if self.notes.contains(key) => Some(u7::new(0)),
            Mode::VelocityShift(delta) if self.notes.contains(key) => {
                Some(shift_velocity(vel, delta))
            }
            _ => None,
        }
    }

    /// Map a single event kind. Anything but a `NoteOn` is returned as-is.
    pub fn apply_kind<'a>(&self, kind: TrackEventKind<'a>) -> TrackEventKind<'a> {
        match kind {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            } => TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key,
                    vel: self.velocity(key, vel).unwrap_or(vel),
                },
            },
            other => other,
        }
    }

    /// Rewrite a track in place, returning how many `NoteOn` velocities changed.
    pub fn apply_track(&self, track: &mut [TrackEvent]) -> usize {
        let mut changed = 0;
        for ev in track.iter_mut() {
            let kind = self.apply_kind(ev.kind);
            if kind != ev.kind {
                ev.kind = kind;
                changed += 1;
            }
        }
        changed
    }

    /// Rewrite every track of a file in place, returning how many `NoteOn` velocities changed.
    ///
    /// Tracks are transformed in parallel if the `parallel` feature is enabled and the file is
    /// large enough.
    pub fn apply(&self, smf: &mut Smf) -> usize {
        #[cfg(feature = "parallel")]
        {
            let event_count = smf.tracks.iter().map(Vec::len).sum::<usize>();
            if event_count >= PARALLEL_ENABLE_THRESHOLD {
                use rayon::prelude::*;

                let changed = smf
                    .tracks
                    .par_iter_mut()
                    .map(|track| self.apply_track(track))
                    .sum::<usize>();
                debug!(
                    mode = ?self.mode,
                    notes = ?self.notes,
                    changed,
                    "transformed midi file in parallel"
                );
                return changed;
            }
        }

        let changed = smf
            .tracks
            .iter_mut()
            .map(|track| self.apply_track(track))
            .sum::<usize>();
        debug!(mode = ?self.mode, notes = ?self.notes, changed, "transformed midi file");
        changed
    }
}

/// Add `delta` to a velocity, clamping to the 7-bit range.
pub fn shift_velocity(vel: u7, delta: i32) -> u7 {
    let shifted = (vel.as_int() as i32).saturating_add(delta).clamp(0, 127);
    u7::new(shifted as u8)
}

/// Decode `raw`, apply `transform` to every track, and encode the result.
///
/// Nothing is produced unless the whole input decodes successfully.
pub fn rewrite(raw: &[u8], transform: &Transform) -> Result<Vec<u8>> {
    let mut smf = Smf::parse(raw)?;
    transform.apply(&mut smf);
    smf.to_bytes()
}
