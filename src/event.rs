//! All sort of events and their parsers.

use crate::{
    prelude::*,
    primitive::{read_varlen_slice, write_varlen_slice},
};

/// Represents a parsed SMF track event.
///
/// Consists of a delta time (in MIDI ticks relative to the previous event) and the actual track
/// event.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TrackEvent<'a> {
    /// How many MIDI ticks after the previous event should this event fire.
    pub delta: u28,
    /// The type of event along with event-specific data.
    pub kind: TrackEventKind<'a>,
}
impl<'a> TrackEvent<'a> {
    /// Create a new event from its delta time and kind.
    #[inline]
    pub fn new(delta: u28, kind: TrackEventKind<'a>) -> TrackEvent<'a> {
        TrackEvent { delta, kind }
    }

    /// Advances the reader and updates `running_status`.
    ///
    /// In case of failure the reader might be left in the middle of an event!
    pub(crate) fn read(
        raw: &mut Reader<'a>,
        running_status: &mut Option<u8>,
    ) -> Result<TrackEvent<'a>> {
        let delta = u28::read_varlen(raw).context("failed to read event deltatime")?;
        let kind = TrackEventKind::read(raw, running_status).context("failed to parse event")?;
        Ok(TrackEvent { delta, kind })
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> WriteResult<W> {
        self.delta.write_varlen(out)?;
        self.kind.write(out)?;
        Ok(())
    }

    /// The exact amount of bytes this event occupies once encoded, delta time included.
    ///
    /// If the event cannot be encoded at all (see [`crate::write`]), this is the amount of bytes
    /// written up to the point of failure.
    pub fn encoded_len(&self) -> usize {
        let mut counter = WriteCounter(0);
        let _ = self.write(&mut counter);
        counter.0 as usize
    }
}

/// Represents the different kinds of SMF events and their associated data.
///
/// It notably does *not* include the timing of the event; the `TrackEvent` struct is responsible
/// for this.
///
/// Byte payloads are borrowed from the decoded buffer and re-emitted verbatim.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum TrackEventKind<'a> {
    /// A message associated to a MIDI channel carrying musical data.
    ///
    /// Usually, the bulk of MIDI data is these kind of messages.
    Midi {
        /// The MIDI channel that this event is associated with.
        channel: u4,
        /// The MIDI message type and associated data.
        message: MidiMessage,
    },
    /// A System Exclusive message, carrying arbitrary data.
    ///
    /// The data bytes included here do not include the implicit `0xF0` prefix.
    ///
    /// Usually SysEx events end with an `0xF7` byte, but SysEx events that are split into several
    /// small packets may only contain the `0xF7` byte in the last packet fragment.
    SysEx(&'a [u8]),
    /// An escape sequence (the `0xF7` form), intended to send arbitrary data to the MIDI
    /// synthesizer or to continue a split SysEx message.
    Escape(&'a [u8]),
    /// A meta-message, giving extra information for correct playback, like tempo, song name,
    /// lyrics, etc...
    Meta(MetaMessage<'a>),
    /// An event this crate does not interpret, including its status byte.
    ///
    /// These are System Common and System Realtime messages (which are not allowed in SMF files,
    /// but show up anyway) and stray data bytes with no running status to attach them to.
    Raw(&'a [u8]),
}
impl<'a> TrackEventKind<'a> {
    fn read(raw: &mut Reader<'a>, running_status: &mut Option<u8>) -> Result<TrackEventKind<'a>> {
        let start = *raw;
        //Read status
        let mut status = raw.peek_u8().context("failed to read status")?;
        if status < 0x80 {
            //Running status!
            match *running_status {
                Some(running) => status = running,
                None => {
                    //A lone data byte, keep it as-is
                    return Ok(TrackEventKind::Raw(raw.read_slice(1)?));
                }
            }
        } else {
            raw.read_u8()?;
        }
        //Delegate further parsing depending on status
        //Meta and sysex events neither use nor clear running status
        let kind = match status {
            0x80..=0xEF => {
                *running_status = Some(status);
                let data = MidiMessage::read_data(status, raw)?;
                let (channel, message) = MidiMessage::read(status, data);
                TrackEventKind::Midi { channel, message }
            }
            0xFF => TrackEventKind::Meta(
                MetaMessage::read(raw).context("failed to read meta event")?,
            ),
            0xF0 => {
                TrackEventKind::SysEx(read_varlen_slice(raw).context("failed to read sysex event")?)
            }
            0xF7 => TrackEventKind::Escape(
                read_varlen_slice(raw).context("failed to read escape event")?,
            ),
            _ => {
                //System common and realtime messages: take as many data bytes as the MIDI
                //standard declares for them
                raw.read_slice(system_data_len(status))
                    .context("failed to read system message data")?;
                TrackEventKind::Raw(start.span_to(raw))
            }
        };
        Ok(kind)
    }

    /// Writes a single event to the given output writer.
    ///
    /// The status byte is always written explicitly, so running status is never used on output.
    fn write<W: Write>(&self, out: &mut W) -> WriteResult<W> {
        match self {
            TrackEventKind::Midi { channel, message } => {
                out.write_u8(message.status_nibble() << 4 | channel.as_int())?;
                message.write(out)?;
            }
            TrackEventKind::SysEx(data) => {
                out.write_u8(0xF0)?;
                write_varlen_slice(data, out)?;
            }
            TrackEventKind::Escape(data) => {
                out.write_u8(0xF7)?;
                write_varlen_slice(data, out)?;
            }
            TrackEventKind::Meta(meta) => {
                out.write_u8(0xFF)?;
                meta.write(out)?;
            }
            TrackEventKind::Raw(bytes) => out.write_all(bytes)?,
        }
        Ok(())
    }

    /// The exact amount of bytes this event kind occupies once encoded, status byte included.
    pub fn encoded_len(&self) -> usize {
        let mut counter = WriteCounter(0);
        let _ = self.write(&mut counter);
        counter.0 as usize
    }
}

/// Amount of data bytes following a System Common or System Realtime status.
fn system_data_len(status: u8) -> usize {
    match status {
        0xF1 | 0xF3 => 1,
        0xF2 => 2,
        _ => 0,
    }
}

/// Represents a MIDI message, usually associated to a MIDI channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MidiMessage {
    /// Stop playing a note.
    NoteOff {
        /// The MIDI key to stop playing.
        key: u7,
        /// The velocity with which to stop playing it.
        vel: u7,
    },
    /// Start playing a note.
    NoteOn {
        /// The key to start playing.
        key: u7,
        /// The velocity (strength) with which to press it.
        ///
        /// Note that by convention a `NoteOn` message with a velocity of 0 is equivalent to a
        /// `NoteOff`.
        vel: u7,
    },
    /// Modify the velocity of a note after it has been played (polyphonic pressure).
    Aftertouch {
        /// The key for which to modify its velocity.
        key: u7,
        /// The new velocity for the key.
        vel: u7,
    },
    /// Modify the value of a MIDI controller.
    Controller {
        /// The controller to modify.
        ///
        /// See the MIDI spec for the meaning of each index.
        controller: u7,
        /// The value to set it to.
        value: u7,
    },
    /// Change the program (also known as instrument) for a channel.
    ProgramChange {
        /// The new program (instrument) to use for the channel.
        program: u7,
    },
    /// Change the note velocity of a whole channel at once, without starting new notes.
    ChannelAftertouch {
        /// The new velocity for all notes currently playing in the channel.
        vel: u7,
    },
    /// Set the pitch bend value for the entire channel.
    PitchBend {
        /// The new pitch-bend value.
        bend: PitchBend,
    },
}
impl MidiMessage {
    /// Midi messages have a known length.
    pub(crate) fn msg_length(status: u8) -> usize {
        const LENGTH_BY_STATUS: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 2, 2, 2, 2, 1, 1, 2, 0];
        LENGTH_BY_STATUS[(status >> 4) as usize] as usize
    }

    /// Extract the data bytes for the given status from the reader.
    pub(crate) fn read_data(status: u8, raw: &mut Reader) -> Result<[u7; 2]> {
        let len = Self::msg_length(status);
        let at = raw.position();
        let data = raw.read_slice(len).context("truncated midi message")?;
        ensure!(
            data.iter().all(|&byte| byte < 0x80),
            Error::at(
                err!(UnsupportedEvent, "midi message data byte with top bit set"),
                at
            )
        );
        Ok(match len {
            1 => [u7::new(data[0]), u7::new(0)],
            _ => [u7::new(data[0]), u7::new(data[1])],
        })
    }

    /// Receives status byte and midi args separately.
    ///
    /// The `status` must be a MIDI message status (0x80..=0xEF).
    pub(crate) fn read(status: u8, data: [u7; 2]) -> (u4, MidiMessage) {
        let channel = u4::from(status);
        let msg = match status >> 4 {
            0x8 => MidiMessage::NoteOff {
                key: data[0],
                vel: data[1],
            },
            0x9 => MidiMessage::NoteOn {
                key: data[0],
                vel: data[1],
            },
            0xA => MidiMessage::Aftertouch {
                key: data[0],
                vel: data[1],
            },
            0xB => MidiMessage::Controller {
                controller: data[0],
                value: data[1],
            },
            0xC => MidiMessage::ProgramChange { program: data[0] },
            0xD => MidiMessage::ChannelAftertouch { vel: data[0] },
            _ => {
                //Note the little-endian order, contrasting with the default big-endian order of
                //Standard Midi Files
                let lsb = data[0].as_int() as u16;
                let msb = data[1].as_int() as u16;
                MidiMessage::PitchBend {
                    bend: PitchBend(u14::from(msb << 7 | lsb)),
                }
            }
        };
        (channel, msg)
    }

    /// Get the raw status nibble for this MIDI message type.
    pub(crate) fn status_nibble(&self) -> u8 {
        match self {
            MidiMessage::NoteOff { .. } => 0x8,
            MidiMessage::NoteOn { .. } => 0x9,
            MidiMessage::Aftertouch { .. } => 0xA,
            MidiMessage::Controller { .. } => 0xB,
            MidiMessage::ProgramChange { .. } => 0xC,
            MidiMessage::ChannelAftertouch { .. } => 0xD,
            MidiMessage::PitchBend { .. } => 0xE,
        }
    }

    /// Write the data part of this message, not including the status.
    pub(crate) fn write<W: Write>(&self, out: &mut W) -> WriteResult<W> {
        match self {
            MidiMessage::NoteOff { key, vel } => out.write_all(&[key.as_int(), vel.as_int()]),
            MidiMessage::NoteOn { key, vel } => out.write_all(&[key.as_int(), vel.as_int()]),
            MidiMessage::Aftertouch { key, vel } => out.write_all(&[key.as_int(), vel.as_int()]),
            MidiMessage::Controller { controller, value } => {
                out.write_all(&[controller.as_int(), value.as_int()])
            }
            MidiMessage::ProgramChange { program } => out.write_u8(program.as_int()),
            MidiMessage::ChannelAftertouch { vel } => out.write_u8(vel.as_int()),
            MidiMessage::PitchBend { bend } => {
                let raw = bend.0.as_int();
                out.write_all(&[(raw & 0x7F) as u8, (raw >> 7) as u8])
            }
        }
    }
}

/// The value of a pitch bend, represented as 14 bits.
///
/// A value of `0x0000` indicates full bend downwards.
/// A value of `0x2000` indicates no bend.
/// A value of `0x3FFF` indicates full bend upwards.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct PitchBend(pub u14);
impl PitchBend {
    /// Create a `PitchBend` value from an int in the range `[-0x2000, 0x1FFF]`.
    ///
    /// Integers outside this range will be clamped.
    #[inline]
    pub fn from_int(int: i16) -> PitchBend {
        PitchBend(u14::new((int.clamp(-0x2000, 0x1FFF) + 0x2000) as u16))
    }

    /// Returns an int in the range `[-0x2000, 0x1FFF]`.
    #[inline]
    pub fn as_int(self) -> i16 {
        self.0.as_int() as i16 - 0x2000
    }
}

/// A "meta message", as defined by the SMF spec.
/// These events carry metadata about the track, such as tempo, time signature, copyright, etc...
///
/// The payload is kept uninterpreted; a few accessors decode the most common meta types.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct MetaMessage<'a> {
    /// The raw meta-message type byte.
    pub kind: u8,
    /// The payload, not including the length prefix.
    pub data: &'a [u8],
}
impl<'a> MetaMessage<'a> {
    pub const TEXT: u8 = 0x01;
    pub const TRACK_NAME: u8 = 0x03;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const TEMPO: u8 = 0x51;

    #[inline]
    pub fn new(kind: u8, data: &'a [u8]) -> MetaMessage<'a> {
        MetaMessage { kind, data }
    }

    /// The end-of-track marker, obligatory at the end of every track.
    #[inline]
    pub fn end_of_track() -> MetaMessage<'static> {
        MetaMessage {
            kind: Self::END_OF_TRACK,
            data: &[],
        }
    }

    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        self.kind == Self::END_OF_TRACK
    }

    /// Amount of microseconds per beat (quarter note), if this is a well-formed tempo event.
    pub fn tempo(&self) -> Option<u32> {
        match (self.kind, self.data) {
            (Self::TEMPO, &[a, b, c]) => Some(u32::from_be_bytes([0, a, b, c])),
            _ => None,
        }
    }

    /// The text payload of the text-like meta messages (types `0x01` through `0x0F`).
    pub fn text(&self) -> Option<&'a [u8]> {
        if (0x01..=0x0F).contains(&self.kind) {
            Some(self.data)
        } else {
            None
        }
    }

    fn read(raw: &mut Reader<'a>) -> Result<MetaMessage<'a>> {
        let kind = raw
            .read_u8()
            .context("failed to read meta message type")?;
        let data = read_varlen_slice(raw).context("failed to read meta message data")?;
        Ok(MetaMessage { kind, data })
    }

    fn write<W: Write>(&self, out: &mut W) -> WriteResult<W> {
        out.write_u8(self.kind)?;
        write_varlen_slice(self.data, out)
    }
}
