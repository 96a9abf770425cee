//! Keyed as-of history.

use std::{collections::BTreeMap, fmt::Debug};

use log::{trace, warn};

use super::{RecordOutcome, Timeline};
use crate::{
    capture::{FirstVisit, Visit},
    frame_store::FrameNumber,
};

/// History of values per key, each effective from the frame it was recorded
/// in until the next entry for the same key.
///
/// Keys are compared as whole values, so composite keys such as
/// `(adapter, handle)` tuples that share a numeric prefix never answer for
/// each other. Entries may only be added with a [`FirstVisit`], and only in
/// increasing frame order per key; every query is read-only.
///
/// # Examples
///
/// ```
/// use framestate::{FrameNumber, IntervalTable, VisitGate};
///
/// let mut gate = VisitGate::new();
/// let mut names = IntervalTable::new();
/// let f3 = gate.first_visit(FrameNumber::new(3)).expect("fresh frame");
/// names.record(&f3, (0_u16, 0x40_u16), "headset");
/// let f9 = gate.first_visit(FrameNumber::new(9)).expect("fresh frame");
/// names.record(&f9, (0, 0x40), "car kit");
///
/// let key = (0, 0x40);
/// assert_eq!(names.query_as_of(&key, FrameNumber::new(2)), None);
/// assert_eq!(names.query_as_of(&key, FrameNumber::new(5)), Some(&"headset"));
/// assert_eq!(names.query_as_of(&key, FrameNumber::new(9)), Some(&"car kit"));
/// ```
#[derive(Clone, Debug)]
pub struct IntervalTable<K, V> {
    timelines: BTreeMap<K, Timeline<V>>,
    records: usize,
}

impl<K, V> Default for IntervalTable<K, V> {
    fn default() -> Self {
        Self {
            timelines: BTreeMap::new(),
            records: 0,
        }
    }
}

impl<K: Ord + Debug, V> IntervalTable<K, V> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Record `value` for `key`, effective from the visited frame onward.
    ///
    /// A second write for the same key and frame keeps the first value and
    /// reports [`RecordOutcome::Duplicate`]. A write for a frame older than
    /// the key's latest entry is rejected with [`RecordOutcome::OutOfOrder`].
    pub fn record(&mut self, first: &FirstVisit, key: K, value: V) -> RecordOutcome {
        self.record_at(first.frame(), key, value)
    }

    /// Record on the writing pass; do nothing on a replay.
    pub fn record_visit(&mut self, visit: Visit<'_>, key: K, value: V) -> RecordOutcome {
        match visit.first() {
            Some(first) => self.record(first, key, value),
            None => RecordOutcome::Replayed,
        }
    }

    pub(crate) fn record_at(&mut self, frame: FrameNumber, key: K, value: V) -> RecordOutcome {
        let outcome = match self.timelines.get_mut(&key) {
            Some(timeline) => timeline.insert(frame, value),
            None => {
                let mut timeline = Timeline::default();
                let outcome = timeline.insert(frame, value);
                trace!("new interval key: key={key:?}, frame={frame}");
                self.timelines.insert(key, timeline);
                return self.count(outcome);
            }
        };
        if let RecordOutcome::OutOfOrder { latest } = outcome {
            warn!("interval write out of capture order: key={key:?}, frame={frame}, latest={latest}");
        }
        self.count(outcome)
    }

    /// The value recorded for `key` in exactly `frame`, for amending it on
    /// the writing pass.
    pub(crate) fn recorded_in_mut(&mut self, key: &K, frame: FrameNumber) -> Option<&mut V> {
        let (from, value) = self.timelines.get_mut(key)?.latest_mut()?;
        (from == frame).then_some(value)
    }

    fn count(&mut self, outcome: RecordOutcome) -> RecordOutcome {
        if outcome.is_recorded() {
            self.records += 1;
        }
        outcome
    }

    /// Value in effect for `key` at `frame`, or `None` when nothing had been
    /// recorded for the key by then.
    #[must_use]
    pub fn query_as_of(&self, key: &K, frame: FrameNumber) -> Option<&V> {
        self.entry_as_of(key, frame).map(|(_, value)| value)
    }

    /// Like [`query_as_of`](Self::query_as_of), also returning the frame the
    /// value became effective in.
    #[must_use]
    pub fn entry_as_of(&self, key: &K, frame: FrameNumber) -> Option<(FrameNumber, &V)> {
        self.timelines.get(key)?.floor(frame)
    }

    /// Most recent entry for `key`.
    #[must_use]
    pub fn latest(&self, key: &K) -> Option<(FrameNumber, &V)> { self.timelines.get(key)?.latest() }

    /// Full history for `key`.
    #[must_use]
    pub fn timeline(&self, key: &K) -> Option<&Timeline<V>> { self.timelines.get(key) }

    /// Number of distinct keys.
    #[must_use]
    pub fn key_count(&self) -> usize { self.timelines.len() }

    /// Number of entries across every key.
    #[must_use]
    pub const fn record_count(&self) -> usize { self.records }

    /// Report whether nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.records == 0 }
}
