//! Specific to the SMF packaging of MIDI streams.

use crate::{
    event::TrackEvent,
    prelude::*,
    primitive::{Format, Timing},
    riff,
};

/// How many bytes must the track data have in order to enable multithreading.
///
/// When writing, the track data size is estimated from the event count using
/// `EVENTS_TO_BYTES`.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// How many bytes per event to estimate when deciding whether to write in parallel.
///
/// Without running status a NoteOn or NoteOff takes DeltaTime + Status + Key + Velocity, a little
/// over 4 bytes on average.
#[cfg(feature = "parallel")]
const EVENTS_TO_BYTES: usize = 4;

/// A single track: simply a list of track events.
pub type Track<'a> = Vec<TrackEvent<'a>>;

/// A decoded Standard Midi File: a header and a list of tracks.
///
/// Byte payloads in the events reference the buffer the file was parsed from, so that buffer must
/// outlive the `Smf`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Smf<'a> {
    pub header: Header,
    pub tracks: Vec<Track<'a>>,
}
impl<'a> Smf<'a> {
    /// Create a new empty `Smf` with the given header.
    #[inline]
    pub fn new(header: Header) -> Smf<'a> {
        Smf {
            header,
            tracks: Vec::new(),
        }
    }

    /// Parse a whole `.mid` file (or an RMID wrapped one) into memory.
    ///
    /// Tracks are decoded in parallel if the `parallel` feature is enabled and the file is large
    /// enough.
    pub fn parse(raw: &'a [u8]) -> Result<Smf<'a>> {
        let (header, tracks) = parse(raw)?;
        let declared = tracks.track_count_hint;
        let tracks = tracks.collect_events()?;
        if declared as usize != tracks.len() {
            warn!(
                declared,
                found = tracks.len(),
                "header track count does not match the track chunks present"
            );
        }
        if header.format == Format::SingleTrack && tracks.len() != 1 {
            warn!(
                tracks = tracks.len(),
                "single-track format file does not have exactly one track"
            );
        }
        debug!(
            format = ?header.format,
            timing = ?header.timing,
            tracks = tracks.len(),
            events = tracks.iter().map(Vec::len).sum::<usize>(),
            "decoded midi file"
        );
        Ok(Smf { header, tracks })
    }

    /// Encode this file into the given sink.
    #[inline]
    pub fn write<W: Write>(&self, out: &mut W) -> WriteResult<W> {
        write(&self.header, &self.tracks, out)
    }

    /// Similar to [`write`](#method.write), but writes to a `std::io::Write` writer.
    #[inline]
    pub fn write_std<W: io::Write>(&self, out: W) -> io::Result<()> {
        write_std(&self.header, &self.tracks, out)
    }

    /// Encode this file into a fresh byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len_hint());
        self.write(&mut out)
            .map_err(|msg| Error::new(err!(InvalidInput, msg)))?;
        Ok(out)
    }

    fn encoded_len_hint(&self) -> usize {
        14 + self
            .tracks
            .iter()
            .map(|track| 8 + track.len() * 4)
            .sum::<usize>()
    }
}

/// Parse a raw MIDI file lazily, yielding its header and a lazy track iterator.
///
/// No track is decoded until the iterator reaches it.
pub fn parse(raw: &[u8]) -> Result<(Header, TrackIter<'_>)> {
    let raw = match riff::unwrap(raw) {
        Some(smf) => {
            trace!(len = smf.len(), "unwrapped rmid file");
            smf
        }
        None => raw,
    };
    let mut chunks = Reader::new(raw);
    let (header, track_count) = Header::read_chunk(&mut chunks)?;
    Ok((
        header,
        TrackIter {
            chunks,
            track_count_hint: track_count,
        },
    ))
}

/// Encode and write a MIDI file into the given generic writer.
///
/// Every MIDI event is written with an explicit status byte.
/// The track count written in the header is `tracks.len()`.
///
/// # Errors
///
/// The MIDI writer raises almost no errors by itself, it only bubbles errors from the underlying
/// writer.
/// The only exception to this rule are extreme cases that break the limits of the MIDI spec: if
/// there are more than 65535 tracks, if the data for a single event is 256MB or larger, or if the
/// total size of any track is 4GB or larger.
///
/// # Implementation notes
///
/// If the `parallel` feature is enabled and the file is large enough, tracks are encoded into
/// separate in-memory buffers on several threads, and then written out in order.
///
/// Otherwise, each track length is computed upfront from the encoded length of its events, and the
/// events are then written straight into the writer.
pub fn write<'a, T, W>(header: &Header, tracks: &[T], out: &mut W) -> WriteResult<W>
where
    T: AsRef<[TrackEvent<'a>]> + Sync,
    W: Write,
{
    //Write the header first
    Chunk::write_header(header, tracks.len(), out)?;

    //Try to write the file in parallel
    #[cfg(feature = "parallel")]
    {
        //Figure out whether multithreading is worth it
        let event_count = tracks
            .iter()
            .map(|track| track.as_ref().len())
            .sum::<usize>();
        if event_count * EVENTS_TO_BYTES > PARALLEL_ENABLE_THRESHOLD {
            use rayon::prelude::*;

            //Write out the tracks in parallel into several different buffers
            let track_chunks = tracks
                .par_iter()
                .map(|track| -> StdResult<Vec<u8>, &'static str> {
                    let mut track_chunk = Vec::new();
                    Chunk::write_to_vec(track.as_ref(), &mut track_chunk)?;
                    Ok(track_chunk)
                })
                .collect::<StdResult<Vec<_>, _>>()
                .map_err(W::invalid_input)?;

            //Write down the tracks sequentially and in order
            for track_chunk in track_chunks {
                out.write_all(&track_chunk)?;
            }
            debug!(tracks = tracks.len(), event_count, "encoded midi file in parallel");
            return Ok(());
        }
    }

    for track in tracks {
        Chunk::write_track(track.as_ref(), out)?;
    }
    Ok(())
}

/// Similar to [`write`](fn.write.html), but writes to a `std::io::Write` writer instead of a
/// `midisolo::io::Write` writer.
#[inline]
pub fn write_std<'a, T, W>(header: &Header, tracks: &[T], out: W) -> io::Result<()>
where
    T: AsRef<[TrackEvent<'a>]> + Sync,
    W: io::Write,
{
    write(header, tracks, &mut IoWrap(out))
}

#[derive(Copy, Clone, Debug)]
enum Chunk<'a> {
    Header(Reader<'a>),
    Track(Reader<'a>),
}
impl<'a> Chunk<'a> {
    /// Read the next `MThd` or `MTrk` chunk, skipping any unknown chunk in between.
    ///
    /// The reader will be modified to point to the next chunk.
    /// If we're *exactly* at EOF, returns a None signalling no more chunks.
    fn read(raw: &mut Reader<'a>) -> Result<Option<Chunk<'a>>> {
        Ok(loop {
            if raw.is_empty() {
                break None;
            }
            let (id, body) = Self::read_frame(raw)?;
            match id {
                b"MThd" => break Some(Chunk::Header(body)),
                b"MTrk" => break Some(Chunk::Track(body)),
                //Unknown chunk, just ignore and read the next one
                _ => warn!(
                    id = %String::from_utf8_lossy(id),
                    len = body.remaining(),
                    "skipping unknown chunk"
                ),
            }
        })
    }

    /// Read a chunk id and length, and split off its body.
    fn read_frame(raw: &mut Reader<'a>) -> Result<(&'a [u8], Reader<'a>)> {
        ensure!(
            raw.remaining() >= 8,
            Error::at(err!(TruncatedChunk, "incomplete chunk header"), raw.position())
        );
        let id = raw.read_slice(4).context("failed to read chunk id")?;
        let len = raw.read_u32().context("failed to read chunk length")? as usize;
        if len > raw.remaining() {
            bail!(Error::at(
                err!(TruncatedChunk, "chunk length exceeds the remaining file size"),
                raw.position() - 4
            ));
        }
        let body = raw.sub_reader(len)?;
        trace!(
            id = %String::from_utf8_lossy(id),
            offset = body.position(),
            len,
            "read chunk"
        );
        Ok((id, body))
    }

    /// Write a header chunk into a writer.
    fn write_header<W: Write>(header: &Header, track_count: usize, out: &mut W) -> WriteResult<W> {
        let track_count = u16::try_from(track_count)
            .map_err(|_| W::invalid_input("track count exceeds 16 bit range"))?;
        let mut header_chunk = [0; 4 + 4 + 6];
        header_chunk[0..4].copy_from_slice(&b"MThd"[..]);
        header_chunk[4..8].copy_from_slice(&6u32.to_be_bytes()[..]);
        header_chunk[8..].copy_from_slice(&header.encode(track_count)[..]);
        out.write_all(&header_chunk[..])
    }

    /// Write a track chunk, computing its length before writing any event.
    fn write_track<W: Write>(track: &[TrackEvent], out: &mut W) -> WriteResult<W> {
        let len = track.iter().map(TrackEvent::encoded_len).sum::<usize>();
        let len = u32::try_from(len)
            .map_err(|_| W::invalid_input("midi chunk size exceeds 32 bit range"))?;
        out.write_all(b"MTrk")?;
        out.write_all(&len.to_be_bytes())?;
        for ev in track {
            ev.write(out)?;
        }
        Ok(())
    }

    /// Write a track chunk into a `Vec`, patching the chunk length once the events are written.
    #[cfg(feature = "parallel")]
    fn write_to_vec(track: &[TrackEvent], out: &mut Vec<u8>) -> StdResult<(), &'static str> {
        let start = out.len();
        out.extend_from_slice(b"MTrk\0\0\0\0");
        for ev in track {
            ev.write(out)?;
        }
        let len = u32::try_from(out.len() - start - 8)
            .map_err(|_| "midi chunk size exceeds 32 bit range")?;
        out[start + 4..start + 8].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }
}

/// A MIDI file header.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Header {
    pub format: Format,
    pub timing: Timing,
}
impl Header {
    #[inline]
    pub fn new(format: Format, timing: Timing) -> Header {
        Header { format, timing }
    }

    /// Read the `MThd` chunk, which must come first, returning the header and the declared track
    /// count.
    fn read_chunk(raw: &mut Reader) -> Result<(Header, u16)> {
        let start = raw.position();
        let id = raw.read_slice(4).context("failed to read header chunk id")?;
        ensure!(
            id == b"MThd",
            Error::at(err!(InvalidHeader, "file does not start with an MThd chunk"), start)
        );
        let len = raw
            .read_u32()
            .context("failed to read header chunk length")?;
        ensure!(
            len == 6,
            Error::at(err!(InvalidHeader, "header chunk length is not 6"), start + 4)
        );
        let mut body = raw.sub_reader(6).context("failed to read header chunk")?;
        Self::read(&mut body)
    }

    /// Read both the header and the track count.
    fn read(raw: &mut Reader) -> Result<(Header, u16)> {
        let format = Format::read(raw)?;
        let track_count = raw.read_u16().context("failed to read track count")?;
        let timing = Timing::read(raw)?;
        Ok((Header::new(format, timing), track_count))
    }

    fn encode(&self, track_count: u16) -> [u8; 6] {
        let mut bytes = [0; 6];
        bytes[0..2].copy_from_slice(&self.format.encode()[..]);
        bytes[2..4].copy_from_slice(&track_count.to_be_bytes()[..]);
        bytes[4..6].copy_from_slice(&self.timing.encode()[..]);
        bytes
    }
}

/// An iterator over the tracks in a Standard Midi File.
///
/// Unknown chunks are skipped, and so are duplicate header chunks.
#[derive(Clone, Debug)]
pub struct TrackIter<'a> {
    chunks: Reader<'a>,
    track_count_hint: u16,
}
impl<'a> TrackIter<'a> {
    /// Get the bytes that have not been split into chunks yet.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.chunks.unread()
    }

    /// The amount of tracks declared by the header that have not been yielded yet.
    #[inline]
    pub fn track_count_hint(&self) -> u16 {
        self.track_count_hint
    }

    /// Decode every remaining track into memory.
    ///
    /// Errors are reported in file order: a broken event in a track takes precedence over a broken
    /// chunk after it.
    pub fn collect_events(self) -> Result<Vec<Track<'a>>> {
        let mut track_iters = Vec::new();
        let mut chunk_err = None;
        for track in self {
            match track {
                Ok(track) => track_iters.push(track),
                Err(err) => {
                    chunk_err = Some(err);
                    break;
                }
            }
        }
        let tracks = Self::decode_tracks(track_iters)?;
        match chunk_err {
            Some(err) => Err(err),
            None => Ok(tracks),
        }
    }

    fn decode_tracks(track_iters: Vec<EventIter<'a>>) -> Result<Vec<Track<'a>>> {
        //Attempt to use multiple threads if possible and enabled
        #[cfg(feature = "parallel")]
        {
            let total = track_iters
                .iter()
                .map(|track| track.unread().len())
                .sum::<usize>();
            if total >= PARALLEL_ENABLE_THRESHOLD {
                use rayon::prelude::*;

                return track_iters
                    .into_par_iter()
                    .map(EventIter::collect_events)
                    .collect::<Result<Vec<_>>>();
            }
        }

        //Fall back to single-threaded
        track_iters
            .into_iter()
            .map(EventIter::collect_events)
            .collect()
    }
}
impl<'a> Iterator for TrackIter<'a> {
    type Item = Result<EventIter<'a>>;

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.track_count_hint as usize, None)
    }

    fn next(&mut self) -> Option<Result<EventIter<'a>>> {
        loop {
            match Chunk::read(&mut self.chunks) {
                Ok(Some(Chunk::Track(track))) => {
                    self.track_count_hint = self.track_count_hint.saturating_sub(1);
                    break Some(Ok(EventIter::new(track)));
                }
                Ok(Some(Chunk::Header(_))) => warn!("ignoring duplicate header chunk"),
                Ok(None) => break None,
                Err(err) => {
                    //Make sure no more chunks are read from the middle of a corrupted chunk
                    self.chunks.exhaust();
                    break Some(Err(err));
                }
            }
        }
    }
}

/// An iterator of events over a single track.
/// Allows deferring the parsing of tracks for later, on an on-demand basis.
///
/// Holds the running status register of the track, which starts out empty.
/// This `struct` is very light, so it can be cloned freely.
#[derive(Clone, Debug)]
pub struct EventIter<'a> {
    raw: Reader<'a>,
    running_status: Option<u8>,
}
impl<'a> EventIter<'a> {
    /// Iterate over the events of a raw track chunk body.
    #[inline]
    pub fn new(raw: Reader<'a>) -> EventIter<'a> {
        EventIter {
            raw,
            running_status: None,
        }
    }

    /// Get the remaining unread bytes.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.raw.unread()
    }

    /// Get the current running status of the track.
    #[inline]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Decode every remaining event in the track.
    pub fn collect_events(self) -> Result<Track<'a>> {
        let mut events = Vec::with_capacity(self.raw.remaining() / 3);
        for ev in self {
            events.push(ev?);
        }
        Ok(events)
    }

    /// Decode every remaining event in the track, along with the raw bytes (delta time excluded)
    /// each event was decoded from.
    pub fn collect_bytemapped(mut self) -> Result<Vec<(&'a [u8], TrackEvent<'a>)>> {
        let mut events = Vec::with_capacity(self.raw.remaining() / 3);
        while !self.raw.is_empty() {
            let mut ev_start = self.raw;
            let ev = self.read_next()?;
            //Already decoded successfully once, only used to skip the delta time
            let _ = u28::read_varlen(&mut ev_start);
            events.push((ev_start.span_to(&self.raw), ev));
        }
        Ok(events)
    }

    /// Read one event, turning reads past the end of the chunk into `TruncatedChunk` errors.
    fn read_next(&mut self) -> Result<TrackEvent<'a>> {
        TrackEvent::read(&mut self.raw, &mut self.running_status).map_err(|err| {
            //The reader is bounded by the declared chunk length, so running out of bytes means
            //the events consume more than the chunk declares
            let err = match err.kind() {
                ErrorKind::OutOfBounds(_) => err.reclassify(err!(
                    TruncatedChunk,
                    "event stream runs past the declared chunk length"
                )),
                _ => err,
            };
            self.raw.exhaust();
            err
        })
    }
}
impl<'a> Iterator for EventIter<'a> {
    type Item = Result<TrackEvent<'a>>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.raw.is_empty() {
            None
        } else {
            Some(self.read_next())
        }
    }
}
