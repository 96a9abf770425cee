//! Synthetic capture driver for the demonstration binary.
//!
//! Builds a link capture that interleaves several connection handles, each
//! reused across connect and disconnect cycles, runs the writing pass, and
//! then replays the capture forwards, backwards and in a strided order.

use std::collections::VecDeque;

use framestate::{
    Capture,
    Dissected,
    FrameNumber,
    ReassemblyConfig,
    ResourceExhausted,
    boundary::{
        BoundaryStream,
        ConnectionKey,
        Direction,
        EventOutcome,
        LinkEvent,
        Role,
        Segmenter,
        SubHeaderError,
    },
};
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::Cli;

const PDUS_PER_CONNECTION: u8 = 3;
const PREFIX: &[u8] = &[0x01, 0x00];

type LinkCapture = Capture<LinkEvent, BoundaryStream>;

/// Reasons the demonstration can fail.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Exhausted(#[from] ResourceExhausted),
    #[error("cannot segment PDU: {0}")]
    Segment(#[from] SubHeaderError),
    #[error("{pass} pass disagrees at frame {frame}")]
    Mismatch {
        pass: &'static str,
        frame: FrameNumber,
    },
}

/// What a run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub frames: u64,
    pub messages: usize,
    pub warnings: u64,
    pub replays: u64,
    pub depth: u32,
}

/// Build the link events for `cli.frames` frames.
pub fn synthesise(cli: &Cli) -> Result<Vec<LinkEvent>, SubHeaderError> {
    let segmenter = Segmenter::new(cli.segment);
    let target = usize::try_from(cli.frames).unwrap_or(usize::MAX);
    let mut queues = vec![VecDeque::new(); usize::from(cli.handles.max(1))];
    let mut generations = vec![0_u32; queues.len()];
    let mut events = Vec::with_capacity(target);

    while events.len() < target {
        for ((handle, queue), generation) in (0_u16..).zip(&mut queues).zip(&mut generations) {
            if queue.is_empty() {
                let link = ConnectionKey::new(0, handle);
                refill(queue, &segmenter, link, *generation, cli.pdu_len)?;
                *generation = generation.wrapping_add(1);
            }
            events.extend(queue.pop_front());
            if events.len() == target {
                break;
            }
        }
    }
    Ok(events)
}

/// Queue one connection lifetime: connect, a few PDUs, disconnect.
fn refill(
    queue: &mut VecDeque<LinkEvent>,
    segmenter: &Segmenter,
    link: ConnectionKey,
    generation: u32,
    pdu_len: u16,
) -> Result<(), SubHeaderError> {
    let role = if generation % 2 == 0 {
        Role::Master
    } else {
        Role::Slave
    };
    queue.push_back(LinkEvent::Connect { link, role });

    for index in 0..PDUS_PER_CONNECTION {
        let direction = if index % 2 == 0 {
            Direction::Sent
        } else {
            Direction::Received
        };
        let seed = link.handle.to_le_bytes()[0] ^ generation.to_le_bytes()[0] ^ index;
        let pdu: Vec<u8> = (0..pdu_len)
            .map(|i| i.to_le_bytes()[0].wrapping_add(seed))
            .collect();
        let prefix: &[u8] = if index == 0 { PREFIX } else { &[] };
        queue.extend(segmenter.events(link, direction, &pdu, prefix)?);
    }

    queue.push_back(LinkEvent::Disconnect { link });
    Ok(())
}

fn replay(capture: &LinkCapture, frame: FrameNumber) -> Option<Dissected<EventOutcome>> {
    capture.redissect(frame, |stream, event, scope| stream.redissect(scope, event))
}

/// Visit every frame once, stepping by a stride coprime with `count`.
fn strided(count: u32) -> Vec<u32> {
    let count = u64::from(count);
    if count == 0 {
        return Vec::new();
    }
    let stride = (7..).find(|s| gcd(*s, count) == 1).unwrap_or(1);
    (0..count)
        .filter_map(|i| u32::try_from(i * stride % count + 1).ok())
        .collect()
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// The writing pass and its replay must agree on what the host dissects.
fn agrees(first: &EventOutcome, replayed: &EventOutcome) -> bool {
    match (first, replayed) {
        (EventOutcome::Fragment(first), EventOutcome::Fragment(replayed)) => {
            first.warnings == replayed.warnings
                && first.status.message() == replayed.status.message()
        }
        (EventOutcome::Connection(_), EventOutcome::Connection(_)) => true,
        _ => false,
    }
}

/// Run the demonstration described by `cli`.
pub fn run(cli: &Cli) -> Result<Summary, DemoError> {
    let events = synthesise(cli)?;
    info!(frames = events.len(), handles = cli.handles, "synthesised capture");

    let mut capture = Capture::open(BoundaryStream::new(ReassemblyConfig::default()));
    let mut first_pass = Vec::with_capacity(events.len());
    for event in events {
        let dissected = capture.ingest(event, |stream, event, scope| stream.dissect(scope, event))?;
        first_pass.push(dissected.output?);
    }
    let count = u32::try_from(capture.frame_count()).unwrap_or(u32::MAX);

    let mut reference = Vec::with_capacity(first_pass.len());
    for (frame, first) in (1..=count).zip(&first_pass) {
        let frame = FrameNumber::new(frame);
        let replayed = replay(&capture, frame).ok_or(DemoError::Mismatch {
            pass: "forward",
            frame,
        })?;
        if !agrees(first, &replayed.output) {
            return Err(DemoError::Mismatch {
                pass: "forward",
                frame,
            });
        }
        reference.push(replayed);
    }

    let mut replays = u64::from(count);
    let orders = [
        ("backward", (1..=count).rev().collect::<Vec<_>>()),
        ("strided", strided(count)),
    ];
    for (pass, order) in orders {
        for frame in order {
            let expected = usize::try_from(frame - 1)
                .ok()
                .and_then(|index| reference.get(index));
            let frame = FrameNumber::new(frame);
            if replay(&capture, frame).as_ref() != expected {
                return Err(DemoError::Mismatch { pass, frame });
            }
            replays += 1;
        }
        debug!(pass, "replay pass agrees with the writing pass");
    }

    let engine = capture.state().engine();
    let messages = engine.message_count();
    let warnings = engine.warnings_total();
    let report = capture.close();
    Ok(Summary {
        frames: report.frames,
        messages,
        warnings,
        replays,
        depth: report.depth,
    })
}
