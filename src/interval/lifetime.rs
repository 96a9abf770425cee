//! Interval history bounded by explicit start and end events.

use std::fmt::Debug;

use log::debug;

use super::{IntervalTable, RecordOutcome};
use crate::{capture::FirstVisit, frame_store::FrameNumber};

/// A value together with the window of frames it is valid in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lifetime<T> {
    /// The value recorded when the lifetime began.
    pub value: T,
    /// Frame of the start event.
    pub opened_in: FrameNumber,
    /// Frame of the end event, or [`FrameNumber::MAX`] while still open.
    pub closed_in: FrameNumber,
}

impl<T> Lifetime<T> {
    /// Report whether `frame` falls inside the window. Both ends are
    /// inclusive: the frames carrying the start and end events belong to the
    /// lifetime.
    #[must_use]
    pub fn contains(&self, frame: FrameNumber) -> bool {
        self.opened_in <= frame && frame <= self.closed_in
    }

    /// Report whether no end event has been seen.
    #[must_use]
    pub fn is_open(&self) -> bool { self.closed_in == FrameNumber::MAX }

    /// Transform the carried value, keeping the window.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lifetime<U> {
        Lifetime {
            value: f(self.value),
            opened_in: self.opened_in,
            closed_in: self.closed_in,
        }
    }
}

/// History of values whose validity ends explicitly, such as a connection
/// handle between its connect and disconnect events.
///
/// Start events go into one [`IntervalTable`], end events into another that
/// remembers which start they closed. A reused key opens a fresh timeline
/// entry per lifetime; the floor lookup finds the most recent start and the
/// window check rejects it when the matching end came before the queried
/// frame.
///
/// # Examples
///
/// ```
/// use framestate::{FrameNumber, LifetimeTable, VisitGate};
///
/// let mut gate = VisitGate::new();
/// let mut handles = LifetimeTable::new();
/// let f5 = gate.first_visit(FrameNumber::new(5)).expect("fresh frame");
/// handles.open(&f5, 0x0b_u16, "master");
/// let f50 = gate.first_visit(FrameNumber::new(50)).expect("fresh frame");
/// handles.close(&f50, 0x0b);
///
/// assert_eq!(handles.value_as_of(&0x0b, FrameNumber::new(30)), Some(&"master"));
/// assert_eq!(handles.value_as_of(&0x0b, FrameNumber::new(55)), None);
/// ```
#[derive(Clone, Debug)]
pub struct LifetimeTable<K, V> {
    opened: IntervalTable<K, V>,
    /// Maps each end event to the start frame of the lifetime it ended.
    closed: IntervalTable<K, FrameNumber>,
}

impl<K, V> Default for LifetimeTable<K, V> {
    fn default() -> Self {
        Self {
            opened: IntervalTable::default(),
            closed: IntervalTable::default(),
        }
    }
}

impl<K: Ord + Debug, V> LifetimeTable<K, V> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Begin a lifetime for `key` at the visited frame.
    ///
    /// Opening a key that is still open supersedes the earlier lifetime from
    /// this frame on.
    pub fn open(&mut self, first: &FirstVisit, key: K, value: V) -> RecordOutcome {
        self.opened.record(first, key, value)
    }

    /// End the lifetime of `key` that is open at the visited frame.
    ///
    /// Returns [`RecordOutcome::NotOpen`] when no lifetime is open, including
    /// when the current one was already closed.
    pub fn close(&mut self, first: &FirstVisit, key: K) -> RecordOutcome {
        let frame = first.frame();
        let Some(lifetime) = self.query_as_of(&key, frame) else {
            debug!("end event without an open lifetime: key={key:?}, frame={frame}");
            return RecordOutcome::NotOpen;
        };
        if !lifetime.is_open() {
            return RecordOutcome::NotOpen;
        }
        let opened_in = lifetime.opened_in;
        self.closed.record(first, key, opened_in)
    }

    /// The lifetime of `key` that contains `frame`, if any.
    #[must_use]
    pub fn query_as_of(&self, key: &K, frame: FrameNumber) -> Option<Lifetime<&V>> {
        let (opened_in, value) = self.opened.entry_as_of(key, frame)?;
        let closed_in = self.closed_for(key, opened_in).unwrap_or(FrameNumber::MAX);
        let lifetime = Lifetime {
            value,
            opened_in,
            closed_in,
        };
        lifetime.contains(frame).then_some(lifetime)
    }

    /// The value of `key`'s lifetime that contains `frame`, if any.
    #[must_use]
    pub fn value_as_of(&self, key: &K, frame: FrameNumber) -> Option<&V> {
        self.query_as_of(key, frame).map(|lifetime| lifetime.value)
    }

    /// Number of lifetimes ever opened.
    #[must_use]
    pub const fn lifetime_count(&self) -> usize { self.opened.record_count() }

    /// End frame of the lifetime that started at `opened_in`.
    ///
    /// End events are recorded in frame order and each names the start it
    /// closed, so the match is the first end at or after `opened_in` naming
    /// it; anything naming a later start means this lifetime was superseded
    /// without an end event.
    fn closed_for(&self, key: &K, opened_in: FrameNumber) -> Option<FrameNumber> {
        self.closed
            .timeline(key)?
            .since(opened_in)
            .take_while(|(_, start)| **start <= opened_in)
            .find(|(_, start)| **start == opened_in)
            .map(|(closed_in, _)| closed_in)
    }
}
