use crate::{
    io::Reader,
    num::{u15, u28, u4, u7},
    parse, parse_note, rewrite, shift_velocity, ErrorKind, Format, Fps, Header, MetaMessage,
    MidiMessage, NoteParseError, NoteSet, PitchBend, Smf, Timing, TrackEvent, TrackEventKind,
    Transform,
};
use rstest::rstest;

/// Parse a file, printing the full error chain on failure.
///
/// The parsed file borrows the buffer, so it must be a named local.
macro_rules! parse {
    ($raw:ident) => {
        match Smf::parse(&$raw[..]) {
            Ok(smf) => smf,
            Err(err) => panic!("failed to parse test file: {:?}", err),
        }
    };
}

/// Parse a file that must be rejected, yielding the error.
macro_rules! parse_err {
    ($raw:expr) => {
        match Smf::parse(&$raw[..]) {
            Ok(smf) => panic!("expected a decode error, got {:?}", smf),
            Err(err) => err,
        }
    };
}

/// `NoteOn 60 100`, then 96 ticks later `NoteOff 60 0`, then end of track.
const SIMPLE_TRACK: &[u8] = &[
    0x00, 0x90, 0x3C, 0x64, //
    0x60, 0x80, 0x3C, 0x00, //
    0x00, 0xFF, 0x2F, 0x00,
];

/// Note events relying on running status, with a text meta event in between.
const RUNNING_STATUS_TRACK: &[u8] = &[
    0x00, 0x90, 0x3C, 0x64, //
    0x10, 0x3E, 0x64, //
    0x00, 0xFF, 0x01, 0x02, b'h', b'i', //
    0x10, 0x3C, 0x00, //
    0x00, 0xFF, 0x2F, 0x00,
];

/// System common and realtime messages interleaved with running status.
const SYSTEM_TRACK: &[u8] = &[
    0x00, 0x90, 0x3C, 0x64, //
    0x00, 0xF2, 0x01, 0x02, //
    0x00, 0xF6, //
    0x00, 0xF1, 0x05, //
    0x00, 0xF8, //
    0x00, 0x3C, 0x00, //
    0x00, 0xFF, 0x2F, 0x00,
];

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut raw = id.to_vec();
    raw.extend_from_slice(&(body.len() as u32).to_be_bytes());
    raw.extend_from_slice(body);
    raw
}

fn header_chunk(format: u16, track_count: u16, division: u16) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&format.to_be_bytes());
    body.extend_from_slice(&track_count.to_be_bytes());
    body.extend_from_slice(&division.to_be_bytes());
    chunk(b"MThd", &body)
}

/// Build a file with 96 ticks per beat out of raw track bodies.
fn smf_bytes(format: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let mut raw = header_chunk(format, tracks.len() as u16, 96);
    for track in tracks {
        raw.extend(chunk(b"MTrk", track));
    }
    raw
}

fn notes(keys: &[u8]) -> NoteSet {
    keys.iter().map(|&key| u7::new(key)).collect()
}

fn midi(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent::new(
        u28::new(delta),
        TrackEventKind::Midi {
            channel: u4::new(0),
            message,
        },
    )
}

fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    midi(
        delta,
        MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    )
}

fn note_off(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    midi(
        delta,
        MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    )
}

fn kind(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
    TrackEvent::new(u28::new(delta), kind)
}

fn end_of_track() -> TrackEvent<'static> {
    kind(0, TrackEventKind::Meta(MetaMessage::end_of_track()))
}

mod reader {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn failed_reads_leave_cursor_untouched() {
        let mut raw = Reader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(raw.read_u16().unwrap(), 0x0102);
        let err = raw.read_u16().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds("not enough bytes left"));
        assert_eq!(err.position(), Some(2));
        assert_eq!(raw.peek_u8().unwrap(), 0x03);
        assert_eq!(raw.read_u8().unwrap(), 0x03);
        assert!(raw.is_empty());
        assert!(raw.read_u8().is_err());
    }

    #[test]
    fn sub_readers_report_absolute_positions() {
        let mut raw = Reader::new(&[0, 1, 2, 3, 4]);
        raw.read_u8().unwrap();
        let mut sub = raw.sub_reader(2).unwrap();
        assert_eq!(raw.position(), 3);
        assert_eq!(sub.position(), 1);
        assert_eq!(sub.read_slice(2).unwrap(), &[1u8, 2][..]);
        assert_eq!(sub.consumed(), 2);
        assert_eq!(sub.read_u8().unwrap_err().position(), Some(3));
        assert_eq!(raw.unread(), &[3u8, 4][..]);
    }
}

mod varlen {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case::zero(&[0x00], 0)]
    #[case::largest_one_byte(&[0x7F], 0x7F)]
    #[case::smallest_two_bytes(&[0x81, 0x00], 0x80)]
    #[case::largest_two_bytes(&[0xFF, 0x7F], 0x3FFF)]
    #[case::smallest_three_bytes(&[0x81, 0x80, 0x00], 0x4000)]
    #[case::largest_three_bytes(&[0xFF, 0xFF, 0x7F], 0x1F_FFFF)]
    #[case::smallest_four_bytes(&[0x81, 0x80, 0x80, 0x00], 0x20_0000)]
    #[case::largest(&[0xFF, 0xFF, 0xFF, 0x7F], 0x0FFF_FFFF)]
    fn minimal_encoding(#[case] bytes: &[u8], #[case] value: u32) {
        let mut raw = Reader::new(bytes);
        assert_eq!(u28::read_varlen(&mut raw).unwrap(), u28::new(value));
        assert!(raw.is_empty());

        let mut out = Vec::new();
        u28::new(value).write_varlen(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn sampled_range() {
        let mut out = Vec::with_capacity(4);
        for value in (0..=u28::max_value().as_int()).step_by(997).chain([0x0FFF_FFFF]) {
            out.clear();
            u28::new(value).write_varlen(&mut out).unwrap();
            let expected_len = match value {
                0..=0x7F => 1,
                0x80..=0x3FFF => 2,
                0x4000..=0x1F_FFFF => 3,
                _ => 4,
            };
            assert_eq!(out.len(), expected_len, "length of {:#x}", value);
            let mut raw = Reader::new(&out);
            assert_eq!(u28::read_varlen(&mut raw).unwrap().as_int(), value);
            assert!(raw.is_empty());
        }
    }

    #[test]
    fn unterminated() {
        let mut raw = Reader::new(&[0x00, 0x80, 0x80, 0x80, 0x80, 0x00]);
        raw.read_u8().unwrap();
        let err = u28::read_varlen(&mut raw).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedVlq(_)));
        assert_eq!(err.position(), Some(1));
    }

    #[test]
    fn eof_inside() {
        let err = u28::read_varlen(&mut Reader::new(&[0x81, 0x80])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OutOfBounds(_)));
        assert_eq!(err.context(), &["unexpected eof while reading varlen int"][..]);
    }
}

mod header {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn metrical() {
        let raw = smf_bytes(1, &[SIMPLE_TRACK]);
        let smf = parse!(raw);
        assert_eq!(
            smf.header,
            Header::new(Format::Parallel, Timing::Metrical(u15::new(96)))
        );
    }

    #[test]
    fn timecode() {
        let mut raw = header_chunk(0, 1, 0xE728);
        raw.extend(chunk(b"MTrk", SIMPLE_TRACK));
        let smf = parse!(raw);
        assert_eq!(
            smf.header,
            Header::new(Format::SingleTrack, Timing::Timecode(Fps::Fps25, 40))
        );
        assert_eq!(smf.to_bytes().unwrap(), raw);
    }

    #[test]
    fn bad_magic() {
        let mut raw = smf_bytes(1, &[SIMPLE_TRACK]);
        raw[0..4].copy_from_slice(b"MTrk");
        let err = parse_err!(raw);
        assert!(matches!(err.kind(), ErrorKind::InvalidHeader(_)));
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn bad_length() {
        let mut raw = chunk(b"MThd", &[0, 1, 0, 1, 0, 96, 0]);
        raw.extend(chunk(b"MTrk", SIMPLE_TRACK));
        let err = parse_err!(raw);
        assert!(matches!(err.kind(), ErrorKind::InvalidHeader(_)));
        assert_eq!(err.position(), Some(4));
    }

    #[rstest]
    #[case::unknown_format(header_chunk(3, 1, 96))]
    #[case::unknown_fps(header_chunk(1, 1, 0xE000))]
    fn bad_values(#[case] header: Vec<u8>) {
        let mut raw = header;
        raw.extend(chunk(b"MTrk", SIMPLE_TRACK));
        let err = parse_err!(raw);
        assert!(matches!(err.kind(), ErrorKind::InvalidHeader(_)));
    }

    #[test]
    fn empty_input() {
        let err = parse_err!(b"");
        assert!(matches!(err.kind(), ErrorKind::OutOfBounds(_)));
    }

    #[test]
    fn track_count_mismatch_is_tolerated() {
        let mut raw = header_chunk(1, 3, 96);
        raw.extend(chunk(b"MTrk", SIMPLE_TRACK));
        let smf = parse!(raw);
        assert_eq!(smf.tracks.len(), 1);
        assert_eq!(smf.to_bytes().unwrap(), smf_bytes(1, &[SIMPLE_TRACK]));
    }

    #[test]
    fn single_track_format_with_several_tracks() {
        let raw = smf_bytes(0, &[SIMPLE_TRACK, SIMPLE_TRACK]);
        let smf = parse!(raw);
        assert_eq!(smf.tracks.len(), 2);
        assert_eq!(smf.to_bytes().unwrap(), raw);
    }
}

mod decode {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple() {
        let raw = smf_bytes(1, &[SIMPLE_TRACK]);
        let smf = parse!(raw);
        assert_eq!(
            smf.tracks,
            vec![vec![note_on(0, 60, 100), note_off(96, 60, 0), end_of_track()]]
        );
    }

    #[test]
    fn running_status_survives_meta_events() {
        let raw = smf_bytes(1, &[RUNNING_STATUS_TRACK]);
        let smf = parse!(raw);
        assert_eq!(
            smf.tracks[0],
            vec![
                note_on(0, 60, 100),
                note_on(16, 62, 100),
                kind(0, TrackEventKind::Meta(MetaMessage::new(MetaMessage::TEXT, b"hi"))),
                note_on(16, 60, 0),
                end_of_track(),
            ]
        );
    }

    #[test]
    fn running_status_resets_per_track() {
        let raw = smf_bytes(1, &[SIMPLE_TRACK, &[0x00, 0x3C, 0x00, 0xFF, 0x2F, 0x00]]);
        let smf = parse!(raw);
        assert_eq!(
            smf.tracks[1],
            vec![kind(0, TrackEventKind::Raw(&[0x3C])), end_of_track()]
        );
    }

    #[test]
    fn running_status_register() {
        let raw = smf_bytes(1, &[RUNNING_STATUS_TRACK]);
        let (_, mut tracks) = parse(&raw).unwrap();
        assert_eq!(tracks.track_count_hint(), 1);
        let mut events = tracks.next().unwrap().unwrap();
        assert_eq!(tracks.track_count_hint(), 0);
        assert!(tracks.next().is_none());

        assert_eq!(events.running_status(), None);
        events.next().unwrap().unwrap();
        assert_eq!(events.running_status(), Some(0x90));
        assert_eq!(events.by_ref().count(), 4);
        assert_eq!(events.running_status(), Some(0x90));
    }

    #[test]
    fn system_messages_are_kept_raw() {
        let raw = smf_bytes(1, &[SYSTEM_TRACK]);
        let smf = parse!(raw);
        assert_eq!(
            smf.tracks[0],
            vec![
                note_on(0, 60, 100),
                kind(0, TrackEventKind::Raw(&[0xF2, 0x01, 0x02])),
                kind(0, TrackEventKind::Raw(&[0xF6])),
                kind(0, TrackEventKind::Raw(&[0xF1, 0x05])),
                kind(0, TrackEventKind::Raw(&[0xF8])),
                note_on(0, 60, 0),
                end_of_track(),
            ]
        );
    }

    #[test]
    fn sysex_and_escape() {
        let track: &[u8] = &[
            0x00, 0xF0, 0x03, 0x7E, 0x7F, 0xF7, //
            0x83, 0x00, 0xF7, 0x01, 0xF7, //
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let raw = smf_bytes(1, &[track]);
        let smf = parse!(raw);
        assert_eq!(
            smf.tracks[0],
            vec![
                kind(0, TrackEventKind::SysEx(&[0x7E, 0x7F, 0xF7])),
                kind(0x180, TrackEventKind::Escape(&[0xF7])),
                end_of_track(),
            ]
        );
        assert_eq!(smf.to_bytes().unwrap(), raw);
    }

    #[test]
    fn midi_data_with_top_bit() {
        let err = parse_err!(smf_bytes(1, &[&[0x00, 0x90, 0x3C, 0x80]]));
        assert!(matches!(err.kind(), ErrorKind::UnsupportedEvent(_)));
        assert_eq!(err.position(), Some(24));
    }

    #[test]
    fn events_overrun_declared_length() {
        let mut raw = header_chunk(1, 1, 96);
        raw.extend_from_slice(b"MTrk");
        raw.extend_from_slice(&10u32.to_be_bytes());
        raw.extend_from_slice(SIMPLE_TRACK);
        let err = parse_err!(raw);
        assert!(matches!(err.kind(), ErrorKind::TruncatedChunk(_)));
        assert_eq!(err.position(), Some(32));
        assert_eq!(err.context()[0], "expected another byte");
        assert!(err.context().contains(&"failed to read meta event"));
        assert_eq!(
            err.to_string(),
            "truncated chunk: event stream runs past the declared chunk length (at byte 32)"
        );
    }

    #[test]
    fn chunk_longer_than_file() {
        let mut raw = header_chunk(1, 1, 96);
        raw.extend_from_slice(b"MTrk");
        raw.extend_from_slice(&100u32.to_be_bytes());
        raw.extend_from_slice(SIMPLE_TRACK);
        let err = parse_err!(raw);
        assert!(matches!(err.kind(), ErrorKind::TruncatedChunk(_)));
        assert_eq!(err.position(), Some(18));
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let mut raw = header_chunk(1, 1, 96);
        raw.extend(chunk(b"XFIH", &[1, 2, 3]));
        raw.extend(chunk(b"MThd", &[0, 0, 0, 1, 0, 48]));
        raw.extend(chunk(b"MTrk", SIMPLE_TRACK));
        let smf = parse!(raw);
        let plain = smf_bytes(1, &[SIMPLE_TRACK]);
        assert_eq!(smf, parse!(plain));
    }

    #[test]
    fn rmid() {
        fn riff_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
            let mut raw = id.to_vec();
            raw.extend_from_slice(&(body.len() as u32).to_le_bytes());
            raw.extend_from_slice(body);
            if body.len() % 2 == 1 {
                raw.push(0);
            }
            raw
        }
        let smf = smf_bytes(1, &[RUNNING_STATUS_TRACK]);
        let mut rmid = b"RMID".to_vec();
        rmid.extend(riff_chunk(b"INFO", &[1, 2, 3]));
        rmid.extend(riff_chunk(b"data", &smf));
        let raw = riff_chunk(b"RIFF", &rmid);
        assert_eq!(parse!(raw), parse!(smf));
    }

    #[test]
    fn bytemapped() {
        let raw = smf_bytes(1, &[RUNNING_STATUS_TRACK]);
        let (_, mut tracks) = parse(&raw).unwrap();
        let track = tracks.next().unwrap().unwrap().collect_bytemapped().unwrap();
        let bytes = track.iter().map(|(bytes, _)| *bytes).collect::<Vec<_>>();
        let expected: Vec<&[u8]> = vec![
            &[0x90, 0x3C, 0x64][..],
            &[0x3E, 0x64][..],
            &[0xFF, 0x01, 0x02, b'h', b'i'][..],
            &[0x3C, 0x00][..],
            &[0xFF, 0x2F, 0x00][..],
        ];
        assert_eq!(bytes, expected);
        assert_eq!(track[1].1, note_on(16, 62, 100));
    }

    #[test]
    fn meta_accessors() {
        let tempo = MetaMessage::new(MetaMessage::TEMPO, &[0x07, 0xA1, 0x20]);
        assert_eq!(tempo.tempo(), Some(500_000));
        assert_eq!(tempo.text(), None);
        assert_eq!(MetaMessage::new(MetaMessage::TEMPO, &[0x07]).tempo(), None);

        let name = MetaMessage::new(MetaMessage::TRACK_NAME, b"Piano");
        assert_eq!(name.text(), Some(&b"Piano"[..]));
        assert!(!name.is_end_of_track());
        assert!(MetaMessage::end_of_track().is_end_of_track());
    }
}

mod encode {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn running_status_is_expanded() {
        let raw = smf_bytes(1, &[RUNNING_STATUS_TRACK]);
        let smf = parse!(raw);
        let expected = smf_bytes(
            1,
            &[&[
                0x00, 0x90, 0x3C, 0x64, //
                0x10, 0x90, 0x3E, 0x64, //
                0x00, 0xFF, 0x01, 0x02, b'h', b'i', //
                0x10, 0x90, 0x3C, 0x00, //
                0x00, 0xFF, 0x2F, 0x00,
            ]],
        );
        assert_eq!(smf.to_bytes().unwrap(), expected);
    }

    #[test]
    fn decode_encode_decode() {
        let raw = smf_bytes(1, &[RUNNING_STATUS_TRACK, SYSTEM_TRACK, SIMPLE_TRACK]);
        let smf = parse!(raw);
        let encoded = smf.to_bytes().unwrap();
        let reparsed = parse!(encoded);
        assert_eq!(smf, reparsed);
        assert_eq!(reparsed.to_bytes().unwrap(), encoded);
    }

    #[test]
    fn write_std_matches_to_bytes() {
        let raw = smf_bytes(1, &[SYSTEM_TRACK]);
        let smf = parse!(raw);
        let mut out = Vec::new();
        smf.write_std(&mut out).unwrap();
        assert_eq!(out, smf.to_bytes().unwrap());
    }

    #[test]
    fn encoded_len_matches_output() {
        let raw = smf_bytes(1, &[RUNNING_STATUS_TRACK, SYSTEM_TRACK]);
        let smf = parse!(raw);
        for ev in smf.tracks.iter().flatten() {
            let mut out = Vec::new();
            ev.write(&mut out).unwrap();
            assert_eq!(ev.encoded_len(), out.len(), "{:?}", ev);
        }
    }

    #[test]
    fn pitch_bend() {
        let bend = midi(
            0,
            MidiMessage::PitchBend {
                bend: PitchBend::from_int(-0x2000),
            },
        );
        let mut out = Vec::new();
        bend.write(&mut out).unwrap();
        assert_eq!(out, [0x00u8, 0xE0, 0x00, 0x00]);
        assert_eq!(PitchBend::from_int(0x7FFF).as_int(), 0x1FFF);
    }

    #[test]
    fn too_many_tracks() {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(96)),
        ));
        smf.tracks = vec![Vec::new(); 0x1_0000];
        let err = smf.to_bytes().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInput(_)));
    }
}

mod transform {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mute() {
        let raw = smf_bytes(1, &[SIMPLE_TRACK]);
        let mut smf = parse!(raw);
        let changed = Transform::mute(notes(&[60])).apply(&mut smf);
        assert_eq!(changed, 1);
        assert_eq!(
            smf.tracks[0],
            vec![note_on(0, 60, 0), note_off(96, 60, 0), end_of_track()]
        );
    }

    #[test]
    fn velocity_shift_clamps() {
        let raw = smf_bytes(1, &[SIMPLE_TRACK]);
        let rewritten = rewrite(&raw, &Transform::velocity_shift(notes(&[60]), 50)).unwrap();
        let expected = smf_bytes(
            1,
            &[&[
                0x00, 0x90, 0x3C, 0x7F, //
                0x60, 0x80, 0x3C, 0x00, //
                0x00, 0xFF, 0x2F, 0x00,
            ]],
        );
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn solo() {
        let raw = smf_bytes(
            1,
            &[&[
                0x00, 0x90, 0x3C, 0x64, //
                0x00, 0x40, 0x5A, //
                0x00, 0x43, 0x50, //
                0x00, 0xFF, 0x2F, 0x00,
            ]],
        );
        let mut smf = parse!(raw);
        let changed = Transform::solo(notes(&[64])).apply(&mut smf);
        assert_eq!(changed, 2);
        assert_eq!(
            smf.tracks[0],
            vec![
                note_on(0, 60, 0),
                note_on(0, 64, 90),
                note_on(0, 67, 0),
                end_of_track(),
            ]
        );
    }

    #[test]
    fn untouched_notes() {
        let raw = smf_bytes(1, &[SIMPLE_TRACK]);
        let mut smf = parse!(raw);
        let before = smf.clone();
        assert_eq!(Transform::mute(notes(&[61, 62])).apply(&mut smf), 0);
        assert_eq!(Transform::solo(notes(&[60])).apply(&mut smf), 0);
        assert_eq!(Transform::velocity_shift(notes(&[59]), 10).apply(&mut smf), 0);
        assert_eq!(smf, before);
    }

    #[test]
    fn silent_note_on_is_not_special() {
        let shift = Transform::velocity_shift(notes(&[60]), 10);
        assert_eq!(shift.apply_kind(note_on(0, 60, 0).kind), note_on(0, 60, 10).kind);
        assert_eq!(shift.velocity(u7::new(61), u7::new(0)), None);
    }

    fn other_events() -> Vec<TrackEvent<'static>> {
        vec![
            note_off(0, 60, 64),
            midi(
                1,
                MidiMessage::Aftertouch {
                    key: u7::new(60),
                    vel: u7::new(20),
                },
            ),
            midi(
                0,
                MidiMessage::Controller {
                    controller: u7::new(7),
                    value: u7::new(100),
                },
            ),
            midi(
                0,
                MidiMessage::ProgramChange {
                    program: u7::new(5),
                },
            ),
            midi(0, MidiMessage::ChannelAftertouch { vel: u7::new(30) }),
            midi(
                0,
                MidiMessage::PitchBend {
                    bend: PitchBend::from_int(-100),
                },
            ),
            kind(5, TrackEventKind::SysEx(&[0x7E, 0xF7])),
            kind(0, TrackEventKind::Escape(&[0xF7])),
            kind(0, TrackEventKind::Raw(&[0xF8])),
            kind(0, TrackEventKind::Meta(MetaMessage::new(MetaMessage::TEXT, b"x"))),
            end_of_track(),
        ]
    }

    #[rstest]
    #[case::solo_nothing(Transform::solo(NoteSet::new()))]
    #[case::mute_everything(Transform::mute(NoteSet::all()))]
    #[case::louder(Transform::velocity_shift(NoteSet::all(), 10))]
    #[case::quieter(Transform::velocity_shift(NoteSet::all(), -200))]
    fn other_events_are_left_alone(#[case] transform: Transform) {
        let events = other_events();
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(480)),
        ));
        smf.tracks.push(events.clone());
        assert_eq!(transform.apply(&mut smf), 0);
        assert_eq!(smf.tracks[0], events);
    }

    #[rstest]
    #[case::up(100, 20, 120)]
    #[case::clamp_up(100, 50, 127)]
    #[case::down(100, -20, 80)]
    #[case::clamp_down(10, -50, 0)]
    #[case::huge(1, i32::MAX, 127)]
    #[case::tiny(126, i32::MIN, 0)]
    fn shifts(#[case] vel: u8, #[case] delta: i32, #[case] expected: u8) {
        assert_eq!(shift_velocity(u7::new(vel), delta), u7::new(expected));
    }

    #[test]
    fn shift_is_monotonic() {
        for vel in [0, 1, 63, 100, 127] {
            let mut last = shift_velocity(u7::new(vel), -300);
            for delta in -300..=300 {
                let shifted = shift_velocity(u7::new(vel), delta);
                assert!(shifted >= last, "vel {} delta {}", vel, delta);
                assert!(shifted.as_int() <= 127);
                last = shifted;
            }
        }
    }

    #[test]
    fn rewrite_aborts_on_decode_errors() {
        let mut raw = smf_bytes(1, &[SIMPLE_TRACK]);
        raw.truncate(raw.len() - 1);
        let err = rewrite(&raw, &Transform::mute(NoteSet::all())).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TruncatedChunk(_)));
    }

    /// Large enough to go through the multithreaded paths when they are enabled.
    #[test]
    fn large_file() {
        fn track(count: usize, vel: u8) -> Vec<u8> {
            let mut track = Vec::new();
            for i in 0..count {
                track.extend_from_slice(&[0x00, 0x90, (i % 128) as u8, vel]);
            }
            track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
            track
        }
        let raw = smf_bytes(1, &[&track(2000, 100), &track(2000, 100)]);
        let mut smf = parse!(raw);
        assert_eq!(smf.tracks[1].len(), 2001);
        let changed = Transform::velocity_shift(NoteSet::all(), 10).apply(&mut smf);
        assert_eq!(changed, 4000);
        assert_eq!(
            smf.to_bytes().unwrap(),
            smf_bytes(1, &[&track(2000, 110), &track(2000, 110)])
        );
    }
}

mod note {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case::number("60", 60)]
    #[case::padded(" 7 ", 7)]
    #[case::middle_c("C4", 60)]
    #[case::lowercase("c4", 60)]
    #[case::lowest("C-1", 0)]
    #[case::highest("G9", 127)]
    #[case::flat("Bb2", 46)]
    #[case::sharp("F#3", 54)]
    #[case::concert_a("A4", 69)]
    #[case::flat_across_octave("Cb4", 59)]
    #[case::sharp_across_octave("B#3", 60)]
    #[case::double_sharp("C##4", 62)]
    fn names(#[case] name: &str, #[case] key: u8) {
        assert_eq!(parse_note(name), Ok(u7::new(key)));
    }

    #[rstest]
    #[case::empty("", NoteParseError::Empty)]
    #[case::bad_letter("H4", NoteParseError::UnknownName("H4".to_string()))]
    #[case::no_octave("C", NoteParseError::UnknownName("C".to_string()))]
    #[case::bad_accidental("Cx4", NoteParseError::UnknownName("Cx4".to_string()))]
    #[case::bad_octave("C4x", NoteParseError::UnknownName("C4x".to_string()))]
    #[case::above("G#9", NoteParseError::OutOfRange("G#9".to_string()))]
    #[case::below("Cb-1", NoteParseError::OutOfRange("Cb-1".to_string()))]
    #[case::number_above("128", NoteParseError::OutOfRange("128".to_string()))]
    fn bad_names(#[case] name: &str, #[case] err: NoteParseError) {
        assert_eq!(parse_note(name), Err(err));
    }

    #[test]
    fn note_sets() {
        let set: NoteSet = "C4, E4 G4,,".parse().unwrap();
        assert_eq!(set, notes(&[60, 64, 67]));
        assert_eq!(set.len(), 3);
        assert_eq!(format!("{:?}", set), "{60, 64, 67}");
        assert_eq!(
            "C4, H2".parse::<NoteSet>(),
            Err(NoteParseError::UnknownName("H2".to_string()))
        );

        let mut set = set.complement();
        assert_eq!(set.len(), 125);
        assert!(!set.contains(u7::new(64)));
        assert!(set.insert(u7::new(64)));
        assert!(!set.insert(u7::new(64)));
        assert!(set.remove(u7::new(0)));
        assert_eq!(set.iter().next(), Some(u7::new(1)));
        assert_eq!(NoteSet::all().len(), 128);
        assert!(NoteSet::new().is_empty());
    }
}
