//! Cross-frame fragment reassembly with replay-stable answers.
//!
//! [`FragmentEngine`] stitches fragments keyed by a session key into whole
//! messages on the writing pass and remembers, per key and per frame, which
//! message every fragment belonged to. Replays look that record up instead
//! of re-accumulating, so every frame of a message reports the same bytes and
//! the same completing frame no matter how often or in which order it is
//! dissected again.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt::Debug,
    hash::{DefaultHasher, Hash, Hasher},
};

use bytes::Bytes;
use log::{debug, warn};

use super::{
    Completion,
    CompletionPolicy,
    MessageId,
    Position,
    ReassembledMessage,
    ReassemblyConfig,
    Status,
    Submission,
    Warning,
};
use crate::{
    capture::{FirstVisit, Visit},
    error::{ResourceExhausted, reserve, reserve_exact},
    frame_store::FrameNumber,
    interval::IntervalTable,
    metrics,
};

/// A message still waiting for fragments.
#[derive(Debug)]
struct PartialMessage {
    message: MessageId,
    buffer: Vec<u8>,
    completion: Completion,
    limit: usize,
}

impl PartialMessage {
    /// Append as much of `payload` as fits and report whether the message is
    /// now complete.
    fn push(
        &mut self,
        payload: &[u8],
        terminal: bool,
        frames: u64,
        warnings: &mut Vec<Warning>,
    ) -> Result<bool, ResourceExhausted> {
        let room = self.limit - self.buffer.len();
        let take = payload.len().min(room);
        if take < payload.len() {
            warnings.push(Warning::MalformedLength {
                expected: self.limit,
                actual: self.buffer.len() + payload.len(),
            });
        }
        reserve(&mut self.buffer, take, "reassembly buffer", frames)?;
        self.buffer.extend_from_slice(&payload[..take]);

        Ok(match self.completion {
            Completion::Terminal => terminal,
            Completion::Length(_) => {
                let full = self.buffer.len() == self.limit;
                if terminal && !full {
                    warnings.push(Warning::MalformedLength {
                        expected: self.limit,
                        actual: self.buffer.len(),
                    });
                }
                full || terminal
            }
        })
    }
}

/// One fragment as the writing pass saw it.
#[derive(Debug)]
struct FragmentTrace {
    frame: FrameNumber,
    fingerprint: u64,
    warnings: Vec<Warning>,
}

/// What the writing pass learned about one message.
#[derive(Debug)]
struct MessageRecord {
    first_frame: FrameNumber,
    /// Frame of every fragment in arrival order, first fragment included.
    frames: Vec<FrameNumber>,
    traces: Vec<FragmentTrace>,
    completed: Option<ReassembledMessage>,
}

impl MessageRecord {
    fn contains(&self, frame: FrameNumber) -> bool { self.frames.binary_search(&frame).is_ok() }

    /// Fragments of this message seen in `frame`, by position in the message.
    /// Position 0 is the first fragment; `continuation` selects the others.
    fn fragments_in(
        &self,
        frame: FrameNumber,
        continuation: bool,
    ) -> impl Iterator<Item = (usize, &FragmentTrace)> + '_ {
        self.traces
            .iter()
            .enumerate()
            .filter(move |(slot, trace)| trace.frame == frame && (*slot > 0) == continuation)
    }

    fn is_last(&self, slot: usize) -> bool { slot + 1 == self.traces.len() }
}

/// Identifies a fragment's bytes so a replay can tell apart several
/// fragments of one key in the same frame.
fn fingerprint(payload: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

/// Capture-scoped fragment reassembler.
///
/// `K` identifies a stream of fragments, for example a connection and
/// direction. Only one message per key accumulates at a time; a new first
/// fragment abandons whatever was pending for that key. Several messages may
/// start on one key in the same frame; replays tell their fragments apart by
/// payload.
///
/// # Examples
///
/// ```
/// use framestate::{
///     FrameNumber,
///     ReassemblyConfig,
///     VisitGate,
///     reassembly::{BoundaryFlag, FlagDriven, FragmentEngine, Status},
/// };
///
/// let mut gate = VisitGate::new();
/// let mut engine = FragmentEngine::new(ReassemblyConfig::default());
/// let fragments = [
///     (10, BoundaryFlag::First, &b"he"[..]),
///     (11, BoundaryFlag::Continuation, &b"ll"[..]),
///     (12, BoundaryFlag::Last, &b"o"[..]),
/// ];
/// for (frame, flag, payload) in fragments {
///     let first = gate.first_visit(FrameNumber::new(frame)).expect("fresh frame");
///     engine
///         .submit(&first, 7_u16, &flag, payload, &FlagDriven)
///         .expect("memory available");
/// }
///
/// let replay = engine.replay(FrameNumber::new(11), &7, &BoundaryFlag::Continuation, b"ll", &FlagDriven);
/// assert_eq!(replay.status, Status::Fragment { reassembled_in: Some(FrameNumber::new(12)) });
/// let done = engine.replay(FrameNumber::new(12), &7, &BoundaryFlag::Last, b"o", &FlagDriven);
/// assert_eq!(done.status.message().map(|m| m.payload()), Some(&b"hello"[..]));
/// ```
#[derive(Debug)]
pub struct FragmentEngine<K> {
    config: ReassemblyConfig,
    pending: BTreeMap<K, PartialMessage>,
    /// Messages started per key, grouped by the frame they started in.
    history: IntervalTable<K, Vec<MessageId>>,
    messages: Vec<MessageRecord>,
    /// Payload fingerprints of continuations that found no message.
    orphans: BTreeMap<(K, FrameNumber), Vec<u64>>,
    warnings: u64,
}

impl<K> FragmentEngine<K>
where
    K: Ord + Clone + Debug,
{
    /// Create an empty engine bounded by `config`.
    #[must_use]
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            config,
            pending: BTreeMap::new(),
            history: IntervalTable::new(),
            messages: Vec::new(),
            orphans: BTreeMap::new(),
            warnings: 0,
        }
    }

    /// Limits applied by this engine.
    #[must_use]
    pub const fn config(&self) -> &ReassemblyConfig { &self.config }

    /// Submit a fragment seen for the first time.
    ///
    /// Returns [`Status::CompletesFirstPass`] with the whole message when this
    /// fragment finishes it, [`Status::Fragment`] with no completing frame
    /// while it is still pending, or [`Status::NotFragmented`] when `policy`
    /// reports a self-contained payload.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] if a reassembly buffer cannot be grown.
    pub fn submit<H, P>(
        &mut self,
        first: &FirstVisit,
        key: K,
        header: &H,
        payload: &[u8],
        policy: &P,
    ) -> Result<Submission, ResourceExhausted>
    where
        H: ?Sized,
        P: CompletionPolicy<H> + ?Sized,
    {
        let frame = first.frame();
        let submission = match policy.classify(header, payload) {
            Position::Unfragmented => Submission::new(Status::NotFragmented),
            Position::First(completion) => self.start(frame, key, completion, payload)?,
            Position::Continuation { terminal } => self.extend(frame, key, terminal, payload)?,
        };
        for warning in &submission.warnings {
            metrics::inc_warnings(warning.kind());
            self.warnings += 1;
        }
        Ok(submission)
    }

    /// Answer for a fragment the writing pass already saw.
    ///
    /// Nothing is accumulated: the status and warnings are rebuilt from what
    /// the writing pass recorded for `key` at `frame`, so repeated replays
    /// agree with each other and with the writing pass.
    #[must_use]
    pub fn replay<H, P>(
        &self,
        frame: FrameNumber,
        key: &K,
        header: &H,
        payload: &[u8],
        policy: &P,
    ) -> Submission
    where
        H: ?Sized,
        P: CompletionPolicy<H> + ?Sized,
    {
        let continuation = match policy.classify(header, payload) {
            Position::Unfragmented => return Submission::new(Status::NotFragmented),
            Position::First(_) => false,
            Position::Continuation { .. } => true,
        };
        let Some((record, slot)) = self.resolve(key, frame, payload, continuation) else {
            return Submission::with_warnings(
                Status::Fragment {
                    reassembled_in: None,
                },
                vec![Warning::OrphanFragment],
            );
        };

        let status = match &record.completed {
            Some(message) if record.is_last(slot) => Status::CompletesReplay(message.clone()),
            Some(message) => Status::Fragment {
                reassembled_in: Some(message.completed_in()),
            },
            None => Status::Fragment {
                reassembled_in: None,
            },
        };
        let warnings = record
            .traces
            .get(slot)
            .map(|trace| trace.warnings.clone())
            .unwrap_or_default();
        Submission::with_warnings(status, warnings)
    }

    /// Submit a fragment on either pass.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] if a first visit cannot grow a buffer.
    pub fn submit_visit<H, P>(
        &mut self,
        visit: Visit<'_>,
        key: K,
        header: &H,
        payload: &[u8],
        policy: &P,
    ) -> Result<Submission, ResourceExhausted>
    where
        H: ?Sized,
        P: CompletionPolicy<H> + ?Sized,
    {
        match visit {
            Visit::First(first) => self.submit(first, key, header, payload, policy),
            Visit::Replay(frame) => Ok(self.replay(frame, &key, header, payload, policy)),
        }
    }

    /// The completed message that `frame` contributed to on `key`.
    ///
    /// When fragments of several messages share the frame, the message that
    /// started first wins.
    #[must_use]
    pub fn message_for(&self, key: &K, frame: FrameNumber) -> Option<&ReassembledMessage> {
        let continuing = self.continuing(key, frame);
        self.started_in(key, frame)
            .iter()
            .chain(&continuing)
            .filter_map(|id| self.record(*id))
            .find(|record| record.contains(frame))?
            .completed
            .as_ref()
    }

    /// Frame in which the message containing `frame` on `key` was completed.
    #[must_use]
    pub fn reassembled_in(&self, key: &K, frame: FrameNumber) -> Option<FrameNumber> {
        self.message_for(key, frame)
            .map(ReassembledMessage::completed_in)
    }

    /// Frames that carried fragments of message `id`, in arrival order.
    #[must_use]
    pub fn fragment_frames(&self, id: MessageId) -> Option<&[FrameNumber]> {
        self.record(id).map(|record| record.frames.as_slice())
    }

    /// Report whether the writing pass found no message for a continuation.
    #[must_use]
    pub fn is_orphan(&self, key: &K, frame: FrameNumber) -> bool {
        self.orphans.contains_key(&(key.clone(), frame))
    }

    /// Drop the message accumulating on `key`, if any.
    ///
    /// Its fragments stay unassembled, and later continuations on `key` are
    /// orphans until a new first fragment arrives.
    pub fn abandon(&mut self, first: &FirstVisit, key: &K) -> bool {
        let Some(stale) = self.pending.remove(key) else {
            return false;
        };
        warn!(
            "abandoning incomplete message: key={key:?}, message={}, received={}, frame={}",
            stale.message,
            stale.buffer.len(),
            first.frame()
        );
        true
    }

    /// Messages started so far, complete or not.
    #[must_use]
    pub fn message_count(&self) -> usize { self.messages.len() }

    /// Warnings raised on the writing pass.
    #[must_use]
    pub const fn warnings_total(&self) -> u64 { self.warnings }

    /// Messages still waiting for fragments.
    #[must_use]
    pub fn in_progress(&self) -> usize { self.pending.len() }

    fn record(&self, id: MessageId) -> Option<&MessageRecord> { self.messages.get(id.index()?) }

    /// Messages whose first fragment arrived on `key` in `frame`.
    fn started_in(&self, key: &K, frame: FrameNumber) -> &[MessageId] {
        match self.history.entry_as_of(key, frame) {
            Some((started, ids)) if started == frame => ids.as_slice(),
            _ => &[],
        }
    }

    /// Messages a continuation on `key` in `frame` could belong to, in the
    /// order they started.
    ///
    /// Only the last message started before `frame` can still be pending
    /// when it begins; any message started in `frame` itself is a candidate
    /// too.
    fn continuing(&self, key: &K, frame: FrameNumber) -> Vec<MessageId> {
        let Some((started, ids)) = self.history.entry_as_of(key, frame) else {
            return Vec::new();
        };
        if started != frame {
            return ids.last().copied().into_iter().collect();
        }
        let carried = frame
            .prev()
            .and_then(|prev| self.history.entry_as_of(key, prev))
            .and_then(|(_, earlier)| earlier.last().copied());
        carried.into_iter().chain(ids.iter().copied()).collect()
    }

    /// The message and fragment position a replayed fragment stands for.
    ///
    /// A fragment whose bytes match one recorded in `frame` resolves to it.
    /// Otherwise a recorded orphan with those bytes stays an orphan, and
    /// anything else falls back to the first candidate fragment in `frame`.
    fn resolve(
        &self,
        key: &K,
        frame: FrameNumber,
        payload: &[u8],
        continuation: bool,
    ) -> Option<(&MessageRecord, usize)> {
        let candidates = if continuation {
            self.continuing(key, frame)
        } else {
            self.started_in(key, frame).to_vec()
        };
        let fragments: Vec<_> = candidates
            .iter()
            .filter_map(|id| self.record(*id))
            .flat_map(|record| {
                record
                    .fragments_in(frame, continuation)
                    .map(move |(slot, trace)| (record, slot, trace.fingerprint))
            })
            .collect();

        let print = fingerprint(payload);
        if let Some((record, slot, _)) = fragments.iter().find(|(_, _, seen)| *seen == print) {
            return Some((*record, *slot));
        }
        let orphaned = self
            .orphans
            .get(&(key.clone(), frame))
            .is_some_and(|prints| prints.contains(&print));
        if continuation && orphaned {
            return None;
        }
        fragments.first().map(|(record, slot, _)| (*record, *slot))
    }

    fn start(
        &mut self,
        frame: FrameNumber,
        key: K,
        completion: Completion,
        payload: &[u8],
    ) -> Result<Submission, ResourceExhausted> {
        let frames = u64::from(frame.get());
        if let Some(stale) = self.pending.remove(&key) {
            warn!(
                "abandoning incomplete message: key={key:?}, message={}, received={}, frame={frame}",
                stale.message,
                stale.buffer.len()
            );
        }

        let cap = self.config.max_message_size.get();
        let mut warnings = Vec::new();
        let limit = match completion {
            Completion::Length(declared) if declared > cap => {
                warnings.push(Warning::MalformedLength {
                    expected: cap,
                    actual: declared,
                });
                cap
            }
            Completion::Length(declared) => declared,
            Completion::Terminal => cap,
        };

        let mut buffer = Vec::new();
        let initial = match completion {
            Completion::Length(_) => limit,
            Completion::Terminal => payload.len().min(limit),
        };
        reserve_exact(&mut buffer, initial, "reassembly buffer", frames)?;
        reserve(&mut self.messages, 1, "message index", frames)?;

        let id = MessageId::new(u64::try_from(self.messages.len()).unwrap_or(u64::MAX));
        if let Some(started) = self.history.recorded_in_mut(&key, frame) {
            reserve(started, 1, "message history", frames)?;
            started.push(id);
            debug!(
                "another message started in the same frame: key={key:?}, message={id}, \
                 frame={frame}"
            );
        } else {
            self.history.record_at(frame, key.clone(), vec![id]);
        }
        self.messages.push(MessageRecord {
            first_frame: frame,
            frames: vec![frame],
            traces: vec![FragmentTrace {
                frame,
                fingerprint: fingerprint(payload),
                warnings: Vec::new(),
            }],
            completed: None,
        });

        let mut partial = PartialMessage {
            message: id,
            buffer,
            completion,
            limit,
        };
        let complete = partial.push(payload, false, frames, &mut warnings)?;
        self.note_warnings(id, &warnings);

        let status = if complete {
            Status::CompletesFirstPass(self.finish(frame, partial))
        } else {
            self.pending.insert(key, partial);
            Status::Fragment {
                reassembled_in: None,
            }
        };
        Ok(Submission::with_warnings(status, warnings))
    }

    fn extend(
        &mut self,
        frame: FrameNumber,
        key: K,
        terminal: bool,
        payload: &[u8],
    ) -> Result<Submission, ResourceExhausted> {
        let frames = u64::from(frame.get());
        let mut entry = match self.pending.entry(key) {
            Entry::Occupied(entry) => entry,
            Entry::Vacant(vacant) => {
                let key = vacant.into_key();
                return Ok(self.orphan(frame, key, payload));
            }
        };
        let id = entry.get().message;
        let mut warnings = Vec::new();
        let complete = entry
            .get_mut()
            .push(payload, terminal, frames, &mut warnings)?;
        let finished = complete.then(|| entry.remove());

        if let Some(record) = id.index().and_then(|index| self.messages.get_mut(index)) {
            reserve(&mut record.frames, 1, "fragment index", frames)?;
            reserve(&mut record.traces, 1, "fragment index", frames)?;
            record.frames.push(frame);
            record.traces.push(FragmentTrace {
                frame,
                fingerprint: fingerprint(payload),
                warnings: Vec::new(),
            });
        }
        self.note_warnings(id, &warnings);

        let status = match finished {
            Some(partial) => Status::CompletesFirstPass(self.finish(frame, partial)),
            None => Status::Fragment {
                reassembled_in: None,
            },
        };
        Ok(Submission::with_warnings(status, warnings))
    }

    fn orphan(&mut self, frame: FrameNumber, key: K, payload: &[u8]) -> Submission {
        warn!("continuation without a message in progress: key={key:?}, frame={frame}");
        self.orphans
            .entry((key, frame))
            .or_default()
            .push(fingerprint(payload));
        Submission::with_warnings(
            Status::Fragment {
                reassembled_in: None,
            },
            vec![Warning::OrphanFragment],
        )
    }

    /// Attach `warnings` to the latest fragment of message `id`.
    fn note_warnings(&mut self, id: MessageId, warnings: &[Warning]) {
        let trace = id
            .index()
            .and_then(|index| self.messages.get_mut(index))
            .and_then(|record| record.traces.last_mut());
        if let Some(trace) = trace {
            trace.warnings.extend_from_slice(warnings);
        }
    }

    fn finish(&mut self, frame: FrameNumber, partial: PartialMessage) -> ReassembledMessage {
        let id = partial.message;
        let record = id.index().and_then(|index| self.messages.get_mut(index));
        let (first_frame, fragments) = record.as_ref().map_or((frame, 1), |record| {
            (
                record.first_frame,
                u32::try_from(record.frames.len()).unwrap_or(u32::MAX),
            )
        });
        let message = ReassembledMessage::new(
            id,
            first_frame,
            frame,
            fragments,
            Bytes::from(partial.buffer),
        );
        if let Some(record) = record {
            record.completed = Some(message.clone());
        }
        metrics::inc_reassembled();
        debug!(
            "message reassembled: message={id}, first_frame={first_frame}, completed_in={frame}, \
             fragments={fragments}, bytes={}",
            message.payload().len()
        );
        message
    }
}
