//! Link events as a capture records them, and their dissection.

use bytes::Bytes;

use super::{BoundaryStream, ConnectionInfo, ConnectionKey, Direction, Role};
use crate::{
    capture::{CallScope, FirstVisit, Visit},
    error::ResourceExhausted,
    frame_store::FrameNumber,
    interval::RecordOutcome,
    reassembly::{BoundaryFlag, Submission},
};

/// One frame's worth of link traffic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connection was established on `link`.
    Connect {
        /// Handle that now names the connection.
        link: ConnectionKey,
        /// Role of the local side.
        role: Role,
    },
    /// The connection on `link` ended.
    Disconnect {
        /// Handle being released.
        link: ConnectionKey,
    },
    /// A fragment of a higher-layer PDU.
    Fragment {
        /// Handle the fragment arrived on.
        link: ConnectionKey,
        /// Which side sent it.
        direction: Direction,
        /// Boundary marker from the transport header.
        flag: BoundaryFlag,
        /// Fragment bytes after the transport header.
        payload: Bytes,
    },
}

/// What dissecting a [`LinkEvent`] produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// A connect or disconnect event; replays report
    /// [`RecordOutcome::Replayed`].
    Connection(RecordOutcome),
    /// A fragment's reassembly result.
    Fragment(Submission),
}

impl EventOutcome {
    /// The reassembly result, for fragment events.
    #[must_use]
    pub const fn submission(&self) -> Option<&Submission> {
        match self {
            Self::Fragment(submission) => Some(submission),
            Self::Connection(_) => None,
        }
    }
}

impl BoundaryStream {
    /// Apply `event` on the writing pass.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] if a reassembly buffer cannot be grown.
    pub fn apply(
        &mut self,
        first: &FirstVisit,
        event: &LinkEvent,
    ) -> Result<EventOutcome, ResourceExhausted> {
        Ok(match event {
            LinkEvent::Connect { link, role } => {
                EventOutcome::Connection(self.connect(first, *link, ConnectionInfo::new(*role)))
            }
            LinkEvent::Disconnect { link } => {
                EventOutcome::Connection(self.disconnect(first, *link))
            }
            LinkEvent::Fragment {
                link,
                direction,
                flag,
                payload,
            } => EventOutcome::Fragment(self.submit(first, *link, *direction, *flag, payload)?),
        })
    }

    /// Dissect `event` again without changing any state.
    #[must_use]
    pub fn replay_event(&self, frame: FrameNumber, event: &LinkEvent) -> EventOutcome {
        match event {
            LinkEvent::Connect { .. } | LinkEvent::Disconnect { .. } => {
                EventOutcome::Connection(RecordOutcome::Replayed)
            }
            LinkEvent::Fragment {
                link,
                direction,
                flag,
                payload,
            } => EventOutcome::Fragment(self.replay(frame, *link, *direction, *flag, payload)),
        }
    }

    /// Dissect `event` on either pass, noting warnings on `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] if a first visit cannot grow a buffer.
    pub fn dissect(
        &mut self,
        scope: &mut CallScope<'_>,
        event: &LinkEvent,
    ) -> Result<EventOutcome, ResourceExhausted> {
        let outcome = match scope.visit() {
            Visit::First(first) => self.apply(first, event)?,
            Visit::Replay(frame) => self.replay_event(frame, event),
        };
        note_warnings(scope, &outcome);
        Ok(outcome)
    }

    /// Read-only dissection for passes after the first.
    #[must_use]
    pub fn redissect(&self, scope: &mut CallScope<'_>, event: &LinkEvent) -> EventOutcome {
        let outcome = self.replay_event(scope.frame(), event);
        note_warnings(scope, &outcome);
        outcome
    }
}

fn note_warnings(scope: &mut CallScope<'_>, outcome: &EventOutcome) {
    if let Some(submission) = outcome.submission() {
        scope.note_all(submission.warnings.iter().copied());
    }
}
