//! Write-once, frame-ordered history for a single key.

use std::collections::BTreeMap;

use crate::frame_store::FrameNumber;

/// Result of trying to extend a timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new entry was added.
    Recorded,
    /// The key already has an entry for this frame; the first value is kept.
    Duplicate,
    /// The frame precedes the key's latest entry and was rejected.
    OutOfOrder {
        /// Latest frame already recorded for the key.
        latest: FrameNumber,
    },
    /// The call came from a read-only pass and changed nothing.
    Replayed,
    /// There was nothing to end at this frame.
    NotOpen,
}

impl RecordOutcome {
    /// Report whether the history changed.
    #[must_use]
    pub const fn is_recorded(self) -> bool { matches!(self, Self::Recorded) }
}

/// Values for one key, each effective from its frame onward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeline<V> {
    entries: BTreeMap<FrameNumber, V>,
}

impl<V> Default for Timeline<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> Timeline<V> {
    pub(crate) fn insert(&mut self, frame: FrameNumber, value: V) -> RecordOutcome {
        if let Some((&latest, _)) = self.entries.last_key_value() {
            if latest == frame {
                return RecordOutcome::Duplicate;
            }
            if latest > frame {
                return RecordOutcome::OutOfOrder { latest };
            }
        }
        self.entries.insert(frame, value);
        RecordOutcome::Recorded
    }

    pub(crate) fn latest_mut(&mut self) -> Option<(FrameNumber, &mut V)> {
        self.entries
            .iter_mut()
            .next_back()
            .map(|(from, value)| (*from, value))
    }

    /// The entry in effect at `frame`: the one with the largest frame not
    /// after it.
    #[must_use]
    pub fn floor(&self, frame: FrameNumber) -> Option<(FrameNumber, &V)> {
        self.entries
            .range(..=frame)
            .next_back()
            .map(|(from, value)| (*from, value))
    }

    /// Entries recorded at or after `frame`, in frame order.
    pub fn since(&self, frame: FrameNumber) -> impl Iterator<Item = (FrameNumber, &V)> + '_ {
        self.entries.range(frame..).map(|(from, value)| (*from, value))
    }

    /// The most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<(FrameNumber, &V)> {
        self.entries.last_key_value().map(|(from, value)| (*from, value))
    }

    /// Every entry in frame order.
    pub fn iter(&self) -> impl Iterator<Item = (FrameNumber, &V)> + '_ {
        self.entries.iter().map(|(from, value)| (*from, value))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Report whether the timeline has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
