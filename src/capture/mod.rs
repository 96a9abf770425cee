//! The capture epoch: every piece of state tied to one loaded capture.
//!
//! A [`Capture`] owns the per-frame [`FrameStore`] and the protocol state `S`
//! that dissectors build up while the capture is read. Frames enter through
//! [`Capture::ingest`], which is the writing pass: the closure receives
//! `&mut S` and a [`CallScope`] carrying the frame's [`FirstVisit`]
//! capability. Any later pass goes through [`Capture::redissect`], which only
//! lends `&S`, so a redraw or filter pass cannot mutate history.
//!
//! Closing or reloading the capture releases all of it in one teardown.

mod scope;
mod visit;

pub use scope::CallScope;
pub use visit::{FirstVisit, Visit, VisitGate};

use log::debug;

use crate::{
    error::ResourceExhausted,
    frame_store::{FrameNumber, FrameStore, TeardownReport},
    metrics,
    reassembly::Warning,
};

/// Output of one dissection call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dissected<T> {
    /// Frame that was dissected.
    pub frame: FrameNumber,
    /// Whatever the dissection closure returned.
    pub output: T,
    /// Warning annotations noted during the call.
    pub warnings: Vec<Warning>,
}

/// Capture-owned state for one loaded capture.
///
/// # Examples
///
/// ```
/// use framestate::{Capture, FrameNumber, IntervalTable};
///
/// let mut capture = Capture::open(IntervalTable::<u16, &str>::new());
/// capture
///     .ingest(7_u16, |names, handle, scope| {
///         let first = scope.first_visit().expect("ingest is the writing pass");
///         names.record(first, *handle, "printer");
///     })
///     .expect("allocation succeeds");
///
/// let replay = capture
///     .redissect(FrameNumber::new(1), |names, handle, scope| {
///         names.query_as_of(handle, scope.frame()).copied()
///     })
///     .expect("frame 1 exists");
/// assert_eq!(replay.output, Some("printer"));
/// ```
#[derive(Debug)]
pub struct Capture<R, S> {
    frames: FrameStore<R>,
    gate: VisitGate,
    state: S,
}

impl<R, S: Default> Default for Capture<R, S> {
    fn default() -> Self { Self::open(S::default()) }
}

impl<R, S> Capture<R, S> {
    /// Open a new, empty capture epoch around `state`.
    #[must_use]
    pub fn open(state: S) -> Self {
        Self {
            frames: FrameStore::new(),
            gate: VisitGate::new(),
            state,
        }
    }

    /// Store `record` as the next frame and run its first-visit dissection.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] when the frame cannot be stored. The
    /// capture cannot be partially indexed, so the caller must abandon the
    /// load.
    pub fn ingest<T, F>(&mut self, record: R, dissect: F) -> Result<Dissected<T>, ResourceExhausted>
    where
        F: FnOnce(&mut S, &R, &mut CallScope<'_>) -> T,
    {
        let frame = self.frames.append(record)?;
        let Some(token) = self.gate.first_visit(frame) else {
            unreachable!("frame store numbers frames in strictly increasing order");
        };
        let Some(record) = self.frames.lookup(frame) else {
            unreachable!("appended frame must be retrievable");
        };

        let mut scope = CallScope::new(Visit::First(&token));
        let output = dissect(&mut self.state, record, &mut scope);
        let warnings = scope.into_warnings();
        metrics::inc_frames(metrics::Pass::First);
        Ok(Dissected {
            frame,
            output,
            warnings,
        })
    }

    /// Dissect an already ingested frame again, read-only.
    ///
    /// Returns `None` when `frame` is zero or has not been ingested.
    pub fn redissect<T, F>(&self, frame: FrameNumber, dissect: F) -> Option<Dissected<T>>
    where
        F: FnOnce(&S, &R, &mut CallScope<'_>) -> T,
    {
        let record = self.frames.lookup(frame)?;
        let mut scope = CallScope::new(Visit::Replay(frame));
        let output = dissect(&self.state, record, &mut scope);
        metrics::inc_frames(metrics::Pass::Replay);
        Some(Dissected {
            frame,
            output,
            warnings: scope.into_warnings(),
        })
    }

    /// Per-frame records ingested so far.
    #[must_use]
    pub const fn frames(&self) -> &FrameStore<R> { &self.frames }

    /// Number of frames ingested so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 { self.frames.len() }

    /// Borrow the protocol state.
    #[must_use]
    pub const fn state(&self) -> &S { &self.state }

    /// Release the capture, returning what the frame store held.
    pub fn close(mut self) -> TeardownReport {
        let report = self.frames.teardown();
        debug!("capture closed: frames={}", report.frames);
        report
    }

    /// Discard every frame and replace the protocol state, as when the capture
    /// is reloaded from the start.
    pub fn reload(&mut self, state: S) -> TeardownReport {
        let report = self.frames.teardown();
        self.gate.reset();
        self.state = state;
        debug!("capture reloaded: released_frames={}", report.frames);
        report
    }
}
