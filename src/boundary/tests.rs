//! Unit tests for sub-header parsing and connection-scoped reassembly.

use std::num::NonZeroUsize;

use rstest::{fixture, rstest};

use super::{
    BoundaryStream,
    EventOutcome,
    LinkEvent,
    Segmenter,
    ConnectionInfo,
    ConnectionKey,
    Direction,
    Role,
    SubHeader,
    SubHeaderError,
};
use crate::{
    Capture,
    FrameNumber,
    RecordOutcome,
    capture::{FirstVisit, Visit},
    reassembly::{BoundaryFlag, Status, Warning},
};

const LINK: ConnectionKey = ConnectionKey::new(0, 0x0b);

fn at(frame: u32) -> FrameNumber { FrameNumber::new(frame) }

fn visit(frame: u32) -> FirstVisit { FirstVisit::new(at(frame)) }

fn with_sub_header(pdu_len: u16, prefix: &[u8], body: &[u8]) -> Vec<u8> {
    let prefix_len = (!prefix.is_empty()).then(|| u8::try_from(prefix.len()).expect("short prefix"));
    let mut first: Vec<u8> = Vec::new();
    SubHeader::new(pdu_len, prefix_len)
        .write(&mut first, prefix)
        .expect("prefix matches");
    first.extend_from_slice(body);
    first
}

/// Handle 0x0b: master from 5 to 50, slave from 60.
#[fixture]
fn stream() -> BoundaryStream {
    let mut stream = BoundaryStream::default();
    assert!(
        stream
            .connect(&visit(5), LINK, ConnectionInfo::new(Role::Master))
            .is_recorded()
    );
    assert!(stream.disconnect(&visit(50), LINK).is_recorded());
    assert!(
        stream
            .connect(&visit(60), LINK, ConnectionInfo::new(Role::Slave))
            .is_recorded()
    );
    stream
}

#[rstest]
#[case(4, None)]
#[case(5, Some(Role::Master))]
#[case(30, Some(Role::Master))]
#[case(50, Some(Role::Master))]
#[case(55, None)]
#[case(59, None)]
#[case(60, Some(Role::Slave))]
#[case(70, Some(Role::Slave))]
fn reused_handle_resolves_role_per_frame(
    stream: BoundaryStream,
    #[case] frame: u32,
    #[case] role: Option<Role>,
) {
    assert_eq!(
        stream
            .connection_as_of(LINK, at(frame))
            .map(|lifetime| lifetime.value.role),
        role
    );
}

#[rstest]
fn handles_on_other_adapters_are_distinct(stream: BoundaryStream) {
    let other = ConnectionKey::new(1, LINK.handle);
    assert!(stream.connection_as_of(other, at(30)).is_none());
}

#[rstest]
fn three_frame_message_replays_identically(mut stream: BoundaryStream) {
    let first = with_sub_header(11, &[], b"hell");
    let fragments = [
        (10, BoundaryFlag::First, first.as_slice()),
        (11, BoundaryFlag::Continuation, &b"o wo"[..]),
        (12, BoundaryFlag::Last, &b"rld"[..]),
    ];

    let mut written = Vec::new();
    for (frame, flag, payload) in fragments {
        let result = stream
            .submit(&visit(frame), LINK, Direction::Sent, flag, payload)
            .expect("memory available");
        assert!(result.warnings.is_empty());
        written.push(result.status);
    }
    let Status::CompletesFirstPass(message) = &written[2] else {
        panic!("frame 12 should complete, got {:?}", written[2]);
    };
    let (header, prefix, pdu) = SubHeader::split(message.payload()).expect("whole sub-header");
    assert_eq!(header.pdu_len(), 11);
    assert!(prefix.is_empty());
    assert_eq!(pdu, b"hello world");

    for (frame, flag, payload) in fragments.into_iter().rev() {
        let replay = stream.replay(at(frame), LINK, Direction::Sent, flag, payload);
        match frame {
            12 => assert_eq!(replay.status, Status::CompletesReplay(message.clone())),
            _ => assert_eq!(
                replay.status,
                Status::Fragment {
                    reassembled_in: Some(at(12))
                }
            ),
        }
        assert_eq!(
            stream
                .message_for(LINK, Direction::Sent, at(frame))
                .map(|m| m.payload()),
            Some(message.payload())
        );
    }
}

#[rstest]
fn prefix_counts_towards_expected_length(mut stream: BoundaryStream) {
    let first = with_sub_header(6, b"psm!", b"abc");
    assert_eq!(SubHeader::expected_len(&first), Some(14));
    stream
        .submit(&visit(20), LINK, Direction::Received, BoundaryFlag::First, &first)
        .expect("memory available");
    let last = stream
        .submit(&visit(21), LINK, Direction::Received, BoundaryFlag::Last, b"def")
        .expect("memory available");

    let message = last.status.message().expect("declared length reached");
    let (_, prefix, pdu) = SubHeader::split(message.payload()).expect("whole sub-header");
    assert_eq!(prefix, b"psm!");
    assert_eq!(pdu, b"abcdef");
}

#[rstest]
fn reused_handle_does_not_inherit_pending_fragments(mut stream: BoundaryStream) {
    let first = with_sub_header(100, &[], b"partial");
    stream
        .submit(&visit(40), LINK, Direction::Sent, BoundaryFlag::First, &first)
        .expect("memory available");

    let late = stream
        .submit(&visit(61), LINK, Direction::Sent, BoundaryFlag::Continuation, b"more")
        .expect("memory available");
    assert_eq!(late.warnings, vec![Warning::OrphanFragment]);
    assert_eq!(stream.engine().in_progress(), 1);
}

#[rstest]
fn directions_reassemble_separately(mut stream: BoundaryStream) {
    let sent = with_sub_header(2, &[], b"");
    let received = with_sub_header(3, &[], b"");
    stream
        .submit(&visit(10), LINK, Direction::Sent, BoundaryFlag::First, &sent)
        .expect("memory available");
    stream
        .submit(&visit(11), LINK, Direction::Received, BoundaryFlag::First, &received)
        .expect("memory available");
    let done = stream
        .submit(&visit(12), LINK, Direction::Sent, BoundaryFlag::Continuation, b"ok")
        .expect("memory available");

    assert!(matches!(done.status, Status::CompletesFirstPass(_)));
    assert_eq!(stream.engine().in_progress(), 1);
}

#[test]
fn traffic_without_a_connection_still_reassembles() {
    let mut stream = BoundaryStream::default();
    let first = with_sub_header(1, &[], b"");
    stream
        .submit(&visit(1), LINK, Direction::Sent, BoundaryFlag::First, &first)
        .expect("memory available");
    let done = stream
        .submit(&visit(2), LINK, Direction::Sent, BoundaryFlag::Last, b"!")
        .expect("memory available");

    assert!(done.status.message().is_some());
    assert_eq!(stream.session(LINK, Direction::Sent, at(2)).opened_in, FrameNumber::NONE);
}

#[rstest]
fn unreadable_first_fragment_is_dissected_as_is(mut stream: BoundaryStream) {
    let result = stream
        .submit(&visit(10), LINK, Direction::Sent, BoundaryFlag::First, &[0x02, 0x00])
        .expect("memory available");
    let expected = vec![Warning::MalformedLength {
        expected: 3,
        actual: 2,
    }];
    assert_eq!(result.status, Status::NotFragmented);
    assert_eq!(result.warnings, expected);

    let replay = stream.replay(at(10), LINK, Direction::Sent, BoundaryFlag::First, &[0x02, 0x00]);
    assert_eq!(replay.status, Status::NotFragmented);
    assert_eq!(replay.warnings, expected);
}

#[rstest]
fn unreadable_first_fragment_ends_the_pending_message(mut stream: BoundaryStream) {
    let first = with_sub_header(4, &[], b"ab");
    stream
        .submit(&visit(10), LINK, Direction::Sent, BoundaryFlag::First, &first)
        .expect("memory available");
    assert_eq!(stream.engine().in_progress(), 1);

    stream
        .submit(&visit(11), LINK, Direction::Sent, BoundaryFlag::First, &[0x02])
        .expect("memory available");
    assert_eq!(stream.engine().in_progress(), 0);

    let late = stream
        .submit(&visit(12), LINK, Direction::Sent, BoundaryFlag::Last, b"cd")
        .expect("memory available");
    assert_eq!(late.warnings, vec![Warning::OrphanFragment]);
    assert_eq!(late.status, Status::Fragment { reassembled_in: None });

    let replay = stream.replay(at(12), LINK, Direction::Sent, BoundaryFlag::Last, b"cd");
    assert_eq!(replay.warnings, vec![Warning::OrphanFragment]);
    assert_eq!(stream.message_for(LINK, Direction::Sent, at(10)), None);
}

#[rstest]
fn complete_fragments_bypass_reassembly(mut stream: BoundaryStream) {
    let token = visit(10);
    let result = stream
        .submit_visit(Visit::from(&token), LINK, Direction::Sent, BoundaryFlag::Complete, b"x")
        .expect("memory available");
    assert_eq!(result.status, Status::NotFragmented);
    assert_eq!(stream.engine().message_count(), 0);
}

#[rstest]
#[case(&[], 3)]
#[case(&[0x05], 3)]
#[case(&[0x05, 0x00], 3)]
#[case(&[0x05, 0x00, 0x01], 4)]
#[case(&[0x05, 0x00, 0x01, 0x02, 0xaa], 6)]
fn truncated_sub_headers_are_rejected(#[case] bytes: &[u8], #[case] needed: usize) {
    assert_eq!(
        SubHeader::parse(bytes),
        Err(SubHeaderError::Truncated {
            needed,
            available: bytes.len(),
        })
    );
    assert_eq!(SubHeader::expected_len(bytes), None);
}

#[test]
fn sub_header_is_little_endian() {
    let header = SubHeader::parse(&[0x34, 0x12, 0x00, 0xff]).expect("fixed fields present");
    assert_eq!(header.pdu_len(), 0x1234);
    assert_eq!(header.prefix_len(), None);
    assert_eq!(header.expected_total(), 3 + 0x1234);
}

#[test]
fn write_rejects_mismatched_prefix() {
    let mut buf: Vec<u8> = Vec::new();
    assert_eq!(
        SubHeader::new(1, Some(2)).write(&mut buf, b"a"),
        Err(SubHeaderError::PrefixLength {
            declared: 2,
            actual: 1,
        })
    );
    assert_eq!(
        SubHeader::new(1, None).write(&mut buf, b"a"),
        Err(SubHeaderError::PrefixLength {
            declared: 0,
            actual: 1,
        })
    );
    assert!(buf.is_empty());
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(7)]
#[case(64)]
fn segmented_pdus_reassemble(#[case] max: usize) {
    let segmenter = Segmenter::new(NonZeroUsize::new(max).expect("non-zero"));
    let pdu: Vec<u8> = (0..40).collect();
    let fragments = segmenter.segment(&pdu, b"pfx").expect("lengths fit");
    assert_eq!(fragments[0].0, BoundaryFlag::First);
    assert!(fragments[0].1.len() >= 7);
    assert!(fragments[1..].iter().all(|(_, payload)| payload.len() <= max));

    let mut stream = BoundaryStream::default();
    let mut completed = None;
    for (frame, (flag, payload)) in (1..).zip(&fragments) {
        let result = stream
            .submit(&visit(frame), LINK, Direction::Sent, *flag, payload)
            .expect("memory available");
        assert!(result.warnings.is_empty());
        if let Some(message) = result.status.message() {
            completed = Some(message.clone());
        }
    }

    let message = completed.expect("declared length reached");
    let (header, prefix, body) = SubHeader::split(message.payload()).expect("whole sub-header");
    assert_eq!(header.prefix_len(), Some(3));
    assert_eq!(prefix, b"pfx");
    assert_eq!(body, pdu.as_slice());
}

#[test]
fn segmenter_rejects_oversized_fields() {
    let segmenter = Segmenter::new(NonZeroUsize::MIN);
    assert_eq!(
        segmenter.segment(&vec![0; 70_000], &[]),
        Err(SubHeaderError::PduTooLong { len: 70_000 })
    );
    assert_eq!(
        segmenter.segment(b"x", &[0; 300]),
        Err(SubHeaderError::PrefixTooLong { len: 300 })
    );
}

#[test]
fn capture_replays_link_events_read_only() {
    let segmenter = Segmenter::new(NonZeroUsize::new(5).expect("non-zero"));
    let mut events = vec![LinkEvent::Connect {
        link: LINK,
        role: Role::Master,
    }];
    events.extend(
        segmenter
            .events(LINK, Direction::Received, b"fragmented", &[])
            .expect("lengths fit"),
    );
    events.push(LinkEvent::Disconnect { link: LINK });

    let mut capture = Capture::open(BoundaryStream::default());
    let mut first_pass = Vec::new();
    for event in events {
        let dissected = capture
            .ingest(event, |stream, event, scope| stream.dissect(scope, event))
            .expect("frame stored");
        first_pass.push(dissected.output.expect("memory available"));
    }
    assert_eq!(first_pass[0], EventOutcome::Connection(RecordOutcome::Recorded));

    let count = u32::try_from(capture.frame_count()).expect("small capture");
    for frame in (1..=count).rev() {
        let replay = capture
            .redissect(at(frame), |stream, event, scope| stream.redissect(scope, event))
            .expect("frame ingested");
        let index = usize::try_from(frame - 1).expect("small index");
        match &first_pass[index] {
            EventOutcome::Fragment(first) => {
                let EventOutcome::Fragment(again) = &replay.output else {
                    panic!("fragment replayed as {:?}", replay.output);
                };
                assert_eq!(again.status.message(), first.status.message());
                assert_eq!(again.status.reassembled_in().is_some(), frame > 1);
            }
            EventOutcome::Connection(_) => {
                assert_eq!(replay.output, EventOutcome::Connection(RecordOutcome::Replayed));
            }
        }
    }
    assert_eq!(capture.state().engine().message_count(), 1);
}
