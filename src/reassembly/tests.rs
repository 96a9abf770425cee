//! Unit tests for fragment accumulation and replay-stable answers.

use std::num::NonZeroUsize;

use proptest::prelude::*;
use rstest::{fixture, rstest};

use super::{
    BoundaryFlag,
    Completion,
    FlagDriven,
    FragmentEngine,
    LengthDriven,
    Position,
    ReassemblyConfig,
    Status,
    Submission,
    Warning,
};
use crate::{
    FrameNumber,
    capture::{FirstVisit, Visit},
};

fn at(frame: u32) -> FrameNumber { FrameNumber::new(frame) }

fn visit(frame: u32) -> FirstVisit { FirstVisit::new(at(frame)) }

/// Reads a one-byte total length from the start of a first fragment.
fn leading_len(payload: &[u8]) -> Option<usize> { payload.first().map(|len| usize::from(*len)) }

fn pending() -> Status {
    Status::Fragment {
        reassembled_in: None,
    }
}

fn done_in(frame: u32) -> Status {
    Status::Fragment {
        reassembled_in: Some(at(frame)),
    }
}

#[fixture]
fn engine() -> FragmentEngine<u16> { FragmentEngine::new(ReassemblyConfig::default()) }

fn capped(max: usize) -> FragmentEngine<u16> {
    let max = NonZeroUsize::new(max).expect("non-zero cap");
    FragmentEngine::new(ReassemblyConfig::default().with_max_message_size(max))
}

fn submit(
    engine: &mut FragmentEngine<u16>,
    frame: u32,
    flag: BoundaryFlag,
    payload: &[u8],
) -> Submission {
    engine
        .submit(&visit(frame), 1, &flag, payload, &FlagDriven)
        .expect("reassembly memory available")
}

/// First at 10, continuation at 11, last at 12.
fn three_fragments(engine: &mut FragmentEngine<u16>) -> Vec<Submission> {
    vec![
        submit(engine, 10, BoundaryFlag::First, b"he"),
        submit(engine, 11, BoundaryFlag::Continuation, b"ll"),
        submit(engine, 12, BoundaryFlag::Last, b"o"),
    ]
}

#[rstest]
fn flag_driven_message_completes_on_last(mut engine: FragmentEngine<u16>) {
    let results = three_fragments(&mut engine);

    assert_eq!(results[0].status, pending());
    assert_eq!(results[1].status, pending());
    let Status::CompletesFirstPass(message) = &results[2].status else {
        panic!("expected completion, got {:?}", results[2].status);
    };
    assert_eq!(message.payload(), b"hello");
    assert_eq!(message.first_frame(), at(10));
    assert_eq!(message.completed_in(), at(12));
    assert_eq!(message.fragments(), 3);
    assert!(results.iter().all(|result| result.warnings.is_empty()));
    assert_eq!(engine.in_progress(), 0);
    assert_eq!(engine.message_count(), 1);
}

#[rstest]
fn replays_in_any_order_agree(mut engine: FragmentEngine<u16>) {
    three_fragments(&mut engine);
    let fragments = [
        (12, BoundaryFlag::Last, &b"o"[..]),
        (10, BoundaryFlag::First, &b"he"[..]),
        (11, BoundaryFlag::Continuation, &b"ll"[..]),
    ];

    for _ in 0..2 {
        for (frame, flag, payload) in fragments {
            let replay = engine.replay(at(frame), &1, &flag, payload, &FlagDriven);
            assert!(replay.warnings.is_empty());
            match frame {
                12 => {
                    let Status::CompletesReplay(message) = replay.status else {
                        panic!("frame 12 should complete on replay");
                    };
                    assert_eq!(message.payload(), b"hello");
                }
                _ => assert_eq!(replay.status, done_in(12)),
            }
        }
    }
    assert_eq!(engine.in_progress(), 0);
    assert_eq!(engine.message_count(), 1);
}

#[rstest]
fn every_contributing_frame_resolves_to_the_same_message(mut engine: FragmentEngine<u16>) {
    three_fragments(&mut engine);
    let expected = engine.message_for(&1, at(12)).cloned().expect("completed");

    for frame in [10, 11, 12] {
        assert_eq!(engine.message_for(&1, at(frame)), Some(&expected));
        assert_eq!(engine.reassembled_in(&1, at(frame)), Some(at(12)));
    }
    assert_eq!(engine.message_for(&1, at(13)), None);
    assert_eq!(engine.message_for(&2, at(11)), None);
    assert_eq!(
        engine.fragment_frames(expected.id()),
        Some(&[at(10), at(11), at(12)][..])
    );
}

#[rstest]
fn complete_flag_bypasses_reassembly(mut engine: FragmentEngine<u16>) {
    let result = submit(&mut engine, 1, BoundaryFlag::Complete, b"whole");
    assert_eq!(result.status, Status::NotFragmented);
    assert!(!result.status.is_fragment());
    assert_eq!(engine.message_count(), 0);
    assert_eq!(
        engine
            .replay(at(1), &1, &BoundaryFlag::Complete, b"whole", &FlagDriven)
            .status,
        Status::NotFragmented
    );
}

#[rstest]
fn length_driven_completes_on_exact_sum(mut engine: FragmentEngine<u16>) {
    let policy = LengthDriven::new(leading_len);
    let fragments = [
        (1, BoundaryFlag::First, &[6_u8, b'a'][..]),
        (2, BoundaryFlag::Continuation, &b"bc"[..]),
        (3, BoundaryFlag::Continuation, &b"de"[..]),
    ];
    let mut last = None;
    for (frame, flag, payload) in fragments {
        last = Some(
            engine
                .submit(&visit(frame), 1, &flag, payload, &policy)
                .expect("memory available"),
        );
    }

    let last = last.expect("three submissions");
    let message = last.status.message().expect("completed without a Last flag");
    assert_eq!(message.payload(), &[6, b'a', b'b', b'c', b'd', b'e']);
    assert!(last.warnings.is_empty());
}

#[rstest]
fn overflowing_fragment_is_clipped(mut engine: FragmentEngine<u16>) {
    let policy = LengthDriven::new(leading_len);
    let first = engine
        .submit(&visit(1), 1, &BoundaryFlag::First, &[4, 1, 2], &policy)
        .expect("memory available");
    assert_eq!(first.status, pending());

    let second = engine
        .submit(&visit(2), 1, &BoundaryFlag::Continuation, &[3, 4, 5], &policy)
        .expect("memory available");
    let expected = vec![Warning::MalformedLength {
        expected: 4,
        actual: 6,
    }];
    assert_eq!(second.warnings, expected);
    assert_eq!(second.status.message().map(|m| m.payload()), Some(&[4, 1, 2, 3][..]));

    let replay = engine.replay(at(2), &1, &BoundaryFlag::Continuation, &[3, 4, 5], &policy);
    assert_eq!(replay.warnings, expected);
    assert_eq!(replay.status.message().map(|m| m.payload()), Some(&[4, 1, 2, 3][..]));
}

#[test]
fn declared_length_above_cap_is_clamped() {
    let mut engine = capped(8);
    let policy = LengthDriven::new(leading_len);
    let first = engine
        .submit(&visit(1), 1, &BoundaryFlag::First, &[100, 0, 0, 0], &policy)
        .expect("memory available");
    assert_eq!(
        first.warnings,
        vec![Warning::MalformedLength {
            expected: 8,
            actual: 100,
        }]
    );

    let second = engine
        .submit(&visit(2), 1, &BoundaryFlag::Continuation, &[0; 4], &policy)
        .expect("memory available");
    assert_eq!(second.status.message().map(|m| m.payload().len()), Some(8));
}

#[test]
fn flag_driven_message_is_bounded_by_cap() {
    let mut engine = capped(4);
    submit(&mut engine, 1, BoundaryFlag::First, b"abc");
    let last = submit(&mut engine, 2, BoundaryFlag::Last, b"def");
    assert_eq!(
        last.warnings,
        vec![Warning::MalformedLength {
            expected: 4,
            actual: 6,
        }]
    );
    assert_eq!(last.status.message().map(|m| m.payload()), Some(&b"abcd"[..]));
}

#[rstest]
fn early_last_completes_short_length_driven_message(mut engine: FragmentEngine<u16>) {
    let policy = LengthDriven::new(leading_len);
    engine
        .submit(&visit(1), 1, &BoundaryFlag::First, &[10, 1, 2, 3], &policy)
        .expect("memory available");
    let last = engine
        .submit(&visit(2), 1, &BoundaryFlag::Last, &[4, 5], &policy)
        .expect("memory available");

    assert_eq!(
        last.warnings,
        vec![Warning::MalformedLength {
            expected: 10,
            actual: 6,
        }]
    );
    assert_eq!(last.status.message().map(|m| m.payload().len()), Some(6));
}

#[rstest]
fn unreadable_length_leaves_fragment_unfragmented(mut engine: FragmentEngine<u16>) {
    let policy = LengthDriven::new(leading_len);
    let result = engine
        .submit(&visit(1), 1, &BoundaryFlag::First, &[], &policy)
        .expect("memory available");
    assert_eq!(result.status, Status::NotFragmented);
}

#[rstest]
fn zero_length_message_completes_immediately(mut engine: FragmentEngine<u16>) {
    let policy = |_: &(), _: &[u8]| Position::First(Completion::Length(0));
    let result = engine
        .submit(&visit(1), 1, &(), b"", &policy)
        .expect("memory available");
    assert_eq!(result.status.message().map(|m| m.payload().len()), Some(0));
}

#[rstest]
fn continuation_without_first_is_orphaned(mut engine: FragmentEngine<u16>) {
    let result = submit(&mut engine, 4, BoundaryFlag::Continuation, b"zz");
    assert_eq!(result.status, pending());
    assert_eq!(result.warnings, vec![Warning::OrphanFragment]);
    assert!(engine.is_orphan(&1, at(4)));
    assert_eq!(engine.message_count(), 0);

    let replay = engine.replay(at(4), &1, &BoundaryFlag::Continuation, b"zz", &FlagDriven);
    assert_eq!(replay.status, pending());
    assert_eq!(replay.warnings, vec![Warning::OrphanFragment]);
    assert_eq!(engine.warnings_total(), 1);
}

#[rstest]
fn new_first_abandons_pending_message(mut engine: FragmentEngine<u16>) {
    submit(&mut engine, 1, BoundaryFlag::First, b"lost");
    submit(&mut engine, 2, BoundaryFlag::First, b"ke");
    let last = submit(&mut engine, 3, BoundaryFlag::Last, b"pt");

    assert_eq!(last.status.message().map(|m| m.payload()), Some(&b"kept"[..]));
    assert_eq!(engine.message_count(), 2);
    assert_eq!(engine.in_progress(), 0);
    assert_eq!(
        engine
            .replay(at(1), &1, &BoundaryFlag::First, b"lost", &FlagDriven)
            .status,
        pending()
    );
    assert_eq!(
        engine
            .replay(at(2), &1, &BoundaryFlag::First, b"ke", &FlagDriven)
            .status,
        done_in(3)
    );
}

#[rstest]
fn message_ending_where_the_next_begins(mut engine: FragmentEngine<u16>) {
    submit(&mut engine, 1, BoundaryFlag::First, b"ab");
    let end = submit(&mut engine, 3, BoundaryFlag::Last, b"cd");
    let begin = submit(&mut engine, 3, BoundaryFlag::First, b"ef");
    submit(&mut engine, 4, BoundaryFlag::Last, b"gh");
    assert!(matches!(end.status, Status::CompletesFirstPass(_)));
    assert_eq!(begin.status, pending());

    let end = engine.replay(at(3), &1, &BoundaryFlag::Last, b"cd", &FlagDriven);
    assert_eq!(end.status.message().map(|m| m.payload()), Some(&b"abcd"[..]));
    let begin = engine.replay(at(3), &1, &BoundaryFlag::First, b"ef", &FlagDriven);
    assert_eq!(begin.status, done_in(4));
}

/// What a replayed fragment should report.
#[derive(Clone, Copy, Debug)]
enum Replayed {
    CompletedIn(u32),
    Completes(&'static [u8]),
}

fn assert_replay(engine: &FragmentEngine<u16>, fragment: (u32, BoundaryFlag, &[u8]), expected: Replayed) {
    let (frame, flag, payload) = fragment;
    let result = engine.replay(at(frame), &1, &flag, payload, &FlagDriven);
    assert!(result.warnings.is_empty(), "{fragment:?}: {:?}", result.warnings);
    match expected {
        Replayed::CompletedIn(done) => assert_eq!(result.status, done_in(done), "{fragment:?}"),
        Replayed::Completes(bytes) => {
            assert!(matches!(result.status, Status::CompletesReplay(_)), "{fragment:?}");
            assert_eq!(result.status.message().map(|m| m.payload()), Some(bytes));
        }
    }
}

/// Frame 10 carries a whole message and the start of the next, which ends
/// in frame 11.
const SHARED_START: [(u32, BoundaryFlag, &[u8], Replayed); 4] = [
    (10, BoundaryFlag::First, b"ab", Replayed::CompletedIn(10)),
    (10, BoundaryFlag::Last, b"c", Replayed::Completes(b"abc")),
    (10, BoundaryFlag::First, b"de", Replayed::CompletedIn(11)),
    (11, BoundaryFlag::Last, b"f", Replayed::Completes(b"def")),
];

#[rstest]
#[case([0, 1, 2, 3])]
#[case([3, 2, 1, 0])]
#[case([2, 0, 3, 1])]
#[case([1, 3, 0, 2])]
fn second_message_started_in_a_frame_replays(
    mut engine: FragmentEngine<u16>,
    #[case] order: [usize; 4],
) {
    for (frame, flag, payload, _) in SHARED_START {
        submit(&mut engine, frame, flag, payload);
    }
    assert_eq!(engine.message_count(), 2);
    assert_eq!(engine.in_progress(), 0);

    for index in order {
        let (frame, flag, payload, expected) = SHARED_START[index];
        assert_replay(&engine, (frame, flag, payload), expected);
    }

    let second = engine.message_for(&1, at(11)).expect("second message resolved");
    assert_eq!(second.payload(), b"def");
    assert_eq!(second.first_frame(), at(10));
    assert_eq!(engine.fragment_frames(second.id()), Some(&[at(10), at(11)][..]));
    assert_eq!(engine.reassembled_in(&1, at(10)), Some(at(10)));
}

#[rstest]
fn several_messages_share_one_frame(mut engine: FragmentEngine<u16>) {
    let fragments: [(u32, BoundaryFlag, &[u8], Replayed); 7] = [
        (5, BoundaryFlag::First, b"x", Replayed::CompletedIn(6)),
        (6, BoundaryFlag::Last, b"y", Replayed::Completes(b"xy")),
        (6, BoundaryFlag::First, b"p", Replayed::CompletedIn(6)),
        (6, BoundaryFlag::Last, b"q", Replayed::Completes(b"pq")),
        (6, BoundaryFlag::First, b"r", Replayed::CompletedIn(7)),
        (6, BoundaryFlag::Continuation, b"s", Replayed::CompletedIn(7)),
        (7, BoundaryFlag::Last, b"t", Replayed::Completes(b"rst")),
    ];
    for (frame, flag, payload, _) in fragments {
        submit(&mut engine, frame, flag, payload);
    }
    assert_eq!(engine.message_count(), 3);

    for (frame, flag, payload, expected) in fragments.iter().rev().copied() {
        assert_replay(&engine, (frame, flag, payload), expected);
    }
    assert_eq!(
        engine.message_for(&1, at(7)).map(|m| m.payload()),
        Some(&b"rst"[..])
    );
}

#[test]
fn orphan_and_clipped_fragments_keep_their_own_warnings() {
    let mut engine = capped(3);
    submit(&mut engine, 1, BoundaryFlag::First, b"ab");
    let clipped_last = submit(&mut engine, 2, BoundaryFlag::Last, b"cd");
    let orphan = submit(&mut engine, 2, BoundaryFlag::Last, b"zz");
    submit(&mut engine, 2, BoundaryFlag::First, b"x");
    let clean = submit(&mut engine, 2, BoundaryFlag::Last, b"y");

    let clipped = vec![Warning::MalformedLength {
        expected: 3,
        actual: 4,
    }];
    assert_eq!(clipped_last.warnings, clipped);
    assert_eq!(orphan.warnings, vec![Warning::OrphanFragment]);
    assert!(clean.warnings.is_empty());
    assert!(engine.is_orphan(&1, at(2)));

    let replay = |payload: &[u8]| engine.replay(at(2), &1, &BoundaryFlag::Last, payload, &FlagDriven);
    let first = replay(b"cd");
    assert_eq!(first.status.message().map(|m| m.payload()), Some(&b"abc"[..]));
    assert_eq!(first.warnings, clipped);
    let lost = replay(b"zz");
    assert_eq!(lost.status, pending());
    assert_eq!(lost.warnings, vec![Warning::OrphanFragment]);
    let second = replay(b"y");
    assert_eq!(second.status.message().map(|m| m.payload()), Some(&b"xy"[..]));
    assert!(second.warnings.is_empty());
}

#[rstest]
fn keys_accumulate_independently(mut engine: FragmentEngine<u16>) {
    let mut send = |frame, key, flag, payload: &[u8]| {
        engine
            .submit(&visit(frame), key, &flag, payload, &FlagDriven)
            .expect("memory available")
    };
    send(1, 1, BoundaryFlag::First, b"a1");
    send(2, 2, BoundaryFlag::First, b"b1");
    let b = send(3, 2, BoundaryFlag::Last, b"b2");
    let a = send(4, 1, BoundaryFlag::Last, b"a2");

    assert_eq!(a.status.message().map(|m| m.payload()), Some(&b"a1a2"[..]));
    assert_eq!(b.status.message().map(|m| m.payload()), Some(&b"b1b2"[..]));
}

#[rstest]
fn submit_visit_dispatches_on_capability(mut engine: FragmentEngine<u16>) {
    let tokens = [visit(1), visit(2)];
    engine
        .submit_visit(Visit::from(&tokens[0]), 1, &BoundaryFlag::First, b"x", &FlagDriven)
        .expect("memory available");
    engine
        .submit_visit(Visit::from(&tokens[1]), 1, &BoundaryFlag::Last, b"y", &FlagDriven)
        .expect("memory available");

    let replay = engine
        .submit_visit(Visit::Replay(at(2)), 1, &BoundaryFlag::Last, b"y", &FlagDriven)
        .expect("replays never allocate");
    assert!(matches!(replay.status, Status::CompletesReplay(_)));
    assert_eq!(engine.message_count(), 1);
}

proptest! {
    #[test]
    fn split_messages_reassemble_to_their_bytes(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 2..12)
    ) {
        let mut engine = FragmentEngine::new(ReassemblyConfig::default());
        let last_index = chunks.len() - 1;
        let mut frame = 0_u32;
        let mut completed = None;
        for (index, chunk) in chunks.iter().enumerate() {
            frame += 1;
            let flag = match index {
                0 => BoundaryFlag::First,
                i if i == last_index => BoundaryFlag::Last,
                _ => BoundaryFlag::Continuation,
            };
            let result = engine
                .submit(&visit(frame), 0_u8, &flag, chunk, &FlagDriven)
                .expect("memory available");
            completed = result.status.message().cloned();
        }

        let message = completed.expect("last chunk completes");
        let joined = chunks.concat();
        prop_assert_eq!(message.payload(), joined.as_slice());
        for contributing in 1..=frame {
            prop_assert_eq!(engine.message_for(&0, at(contributing)), Some(&message));
        }
    }
}
