//! Reassembly of boundary-flag streams over connection lifetimes.

use log::{debug, trace};

use super::{ConnectionInfo, ConnectionKey, Direction, SessionKey, SubHeader, SubHeaderError};
use crate::{
    capture::{FirstVisit, Visit},
    error::ResourceExhausted,
    frame_store::FrameNumber,
    interval::{Lifetime, LifetimeTable, RecordOutcome},
    metrics,
    reassembly::{
        BoundaryFlag,
        FragmentEngine,
        LengthDriven,
        ReassembledMessage,
        ReassemblyConfig,
        Submission,
        Warning,
    },
};

/// Connection lifetimes plus the fragment engine for their traffic.
///
/// Fragments are keyed by [`SessionKey`], so a handle reused after a
/// disconnect starts from a clean slate. Messages end once the length
/// declared by the first fragment's [`SubHeader`] has arrived.
///
/// # Examples
///
/// ```
/// use framestate::{
///     FrameNumber,
///     VisitGate,
///     boundary::{BoundaryStream, ConnectionInfo, ConnectionKey, Direction, Role, SubHeader},
///     reassembly::{BoundaryFlag, Status},
/// };
///
/// let mut gate = VisitGate::new();
/// let mut stream = BoundaryStream::default();
/// let link = ConnectionKey::new(0, 0x40);
///
/// let f1 = gate.first_visit(FrameNumber::new(1)).expect("fresh frame");
/// stream.connect(&f1, link, ConnectionInfo::new(Role::Master));
///
/// let mut first: Vec<u8> = Vec::new();
/// SubHeader::new(2, None).write(&mut first, &[]).expect("no prefix");
/// let f2 = gate.first_visit(FrameNumber::new(2)).expect("fresh frame");
/// stream
///     .submit(&f2, link, Direction::Sent, BoundaryFlag::First, &first)
///     .expect("memory available");
/// let f3 = gate.first_visit(FrameNumber::new(3)).expect("fresh frame");
/// let last = stream
///     .submit(&f3, link, Direction::Sent, BoundaryFlag::Continuation, b"hi")
///     .expect("memory available");
///
/// assert!(matches!(last.status, Status::CompletesFirstPass(_)));
/// ```
#[derive(Debug)]
pub struct BoundaryStream {
    connections: LifetimeTable<ConnectionKey, ConnectionInfo>,
    engine: FragmentEngine<SessionKey>,
}

impl Default for BoundaryStream {
    fn default() -> Self { Self::new(ReassemblyConfig::default()) }
}

impl BoundaryStream {
    /// Create an empty stream whose messages are bounded by `config`.
    #[must_use]
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            connections: LifetimeTable::new(),
            engine: FragmentEngine::new(config),
        }
    }

    /// Record a connect event for `key`.
    pub fn connect(
        &mut self,
        first: &FirstVisit,
        key: ConnectionKey,
        info: ConnectionInfo,
    ) -> RecordOutcome {
        debug!(
            "connection opened: key={key}, role={}, frame={}",
            info.role,
            first.frame()
        );
        self.connections.open(first, key, info)
    }

    /// Record a disconnect event for `key`.
    ///
    /// The disconnect frame still belongs to the connection.
    pub fn disconnect(&mut self, first: &FirstVisit, key: ConnectionKey) -> RecordOutcome {
        let outcome = self.connections.close(first, key);
        debug!(
            "connection closed: key={key}, frame={}, outcome={outcome:?}",
            first.frame()
        );
        outcome
    }

    /// The connection on `key` that was live in `frame`.
    #[must_use]
    pub fn connection_as_of(
        &self,
        key: ConnectionKey,
        frame: FrameNumber,
    ) -> Option<Lifetime<&ConnectionInfo>> {
        self.connections.query_as_of(&key, frame)
    }

    /// Reassembly key for traffic on `key` in `frame`.
    #[must_use]
    pub fn session(&self, key: ConnectionKey, direction: Direction, frame: FrameNumber) -> SessionKey {
        let opened_in = self
            .connection_as_of(key, frame)
            .map_or(FrameNumber::NONE, |lifetime| lifetime.opened_in);
        SessionKey {
            connection: key,
            opened_in,
            direction,
        }
    }

    /// Submit a fragment seen for the first time.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] if a reassembly buffer cannot be grown.
    pub fn submit(
        &mut self,
        first: &FirstVisit,
        key: ConnectionKey,
        direction: Direction,
        flag: BoundaryFlag,
        payload: &[u8],
    ) -> Result<Submission, ResourceExhausted> {
        let session = self.session(key, direction, first.frame());
        trace!("fragment: session={session:?}, flag={flag:?}, len={}", payload.len());
        let policy = LengthDriven::new(SubHeader::expected_len);
        let mut submission = self
            .engine
            .submit(first, session, &flag, payload, &policy)?;
        if let Some(warning) = unreadable_sub_header(flag, payload) {
            debug!("first fragment too short for its sub-header: session={session:?}");
            self.engine.abandon(first, &session);
            metrics::inc_warnings(warning.kind());
            submission.warnings.push(warning);
        }
        Ok(submission)
    }

    /// Answer for a fragment the writing pass already saw.
    #[must_use]
    pub fn replay(
        &self,
        frame: FrameNumber,
        key: ConnectionKey,
        direction: Direction,
        flag: BoundaryFlag,
        payload: &[u8],
    ) -> Submission {
        let session = self.session(key, direction, frame);
        let policy = LengthDriven::new(SubHeader::expected_len);
        let mut submission = self.engine.replay(frame, &session, &flag, payload, &policy);
        submission
            .warnings
            .extend(unreadable_sub_header(flag, payload));
        submission
    }

    /// Submit a fragment on either pass.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] if a first visit cannot grow a buffer.
    pub fn submit_visit(
        &mut self,
        visit: Visit<'_>,
        key: ConnectionKey,
        direction: Direction,
        flag: BoundaryFlag,
        payload: &[u8],
    ) -> Result<Submission, ResourceExhausted> {
        match visit {
            Visit::First(first) => self.submit(first, key, direction, flag, payload),
            Visit::Replay(frame) => Ok(self.replay(frame, key, direction, flag, payload)),
        }
    }

    /// The completed message that `frame` contributed to.
    #[must_use]
    pub fn message_for(
        &self,
        key: ConnectionKey,
        direction: Direction,
        frame: FrameNumber,
    ) -> Option<&ReassembledMessage> {
        self.engine
            .message_for(&self.session(key, direction, frame), frame)
    }

    /// The underlying fragment engine.
    #[must_use]
    pub const fn engine(&self) -> &FragmentEngine<SessionKey> { &self.engine }
}

/// A first fragment whose sub-header cannot be read is dissected as is. It
/// still ends whatever message was accumulating on its session.
fn unreadable_sub_header(flag: BoundaryFlag, payload: &[u8]) -> Option<Warning> {
    if flag != BoundaryFlag::First {
        return None;
    }
    match SubHeader::parse(payload) {
        Err(SubHeaderError::Truncated { needed, available }) => Some(Warning::MalformedLength {
            expected: needed,
            actual: available,
        }),
        _ => None,
    }
}
