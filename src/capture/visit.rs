//! Capabilities separating the writing pass from read-only passes.
//!
//! Only a [`FirstVisit`] can mutate capture history. Tokens are minted by a
//! [`VisitGate`] in strictly increasing frame order, which is the ordering
//! every as-of lookup relies on. Read-only passes describe themselves with
//! [`Visit::Replay`], which anyone may construct because it grants nothing.

use log::warn;

use crate::frame_store::FrameNumber;

/// Proof that the current dissection call is the first visit of its frame.
///
/// The token cannot be cloned or constructed outside this crate. History
/// containers take `&FirstVisit` for every write, so a redraw pass that only
/// holds a frame number has no way to mutate them.
#[derive(Debug, PartialEq, Eq)]
pub struct FirstVisit {
    frame: FrameNumber,
}

impl FirstVisit {
    pub(crate) const fn new(frame: FrameNumber) -> Self { Self { frame } }

    /// Frame being visited for the first time.
    #[must_use]
    pub const fn frame(&self) -> FrameNumber { self.frame }
}

/// How the current dissection call sees its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit<'a> {
    /// The writing pass; history may be extended.
    First(&'a FirstVisit),
    /// A later read-only pass over an already visited frame.
    Replay(FrameNumber),
}

impl<'a> Visit<'a> {
    /// Frame being dissected.
    #[must_use]
    pub const fn frame(self) -> FrameNumber {
        match self {
            Self::First(token) => token.frame(),
            Self::Replay(frame) => frame,
        }
    }

    /// The write capability, when this is the first visit.
    #[must_use]
    pub const fn first(self) -> Option<&'a FirstVisit> {
        match self {
            Self::First(token) => Some(token),
            Self::Replay(_) => None,
        }
    }

    /// Report whether this is the writing pass.
    #[must_use]
    pub const fn is_first(self) -> bool { matches!(self, Self::First(_)) }
}

impl<'a> From<&'a FirstVisit> for Visit<'a> {
    fn from(token: &'a FirstVisit) -> Self { Self::First(token) }
}

/// Mints [`FirstVisit`] tokens for a host loop that numbers frames itself.
///
/// [`Capture`](crate::Capture) owns a gate internally; hosts that keep their
/// own frame list use one directly.
///
/// # Examples
///
/// ```
/// use framestate::{FrameNumber, VisitGate};
///
/// let mut gate = VisitGate::new();
/// let first = gate.first_visit(FrameNumber::new(1)).expect("fresh frame");
/// assert_eq!(first.frame(), FrameNumber::new(1));
/// assert!(gate.first_visit(FrameNumber::new(1)).is_none());
/// assert!(gate.first_visit(FrameNumber::new(3)).is_some());
/// ```
#[derive(Debug, Default)]
pub struct VisitGate {
    last: FrameNumber,
}

impl VisitGate {
    /// Create a gate that has not visited any frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: FrameNumber::NONE,
        }
    }

    /// Claim the first visit of `frame`.
    ///
    /// Returns `None` when `frame` is not later than every frame already
    /// claimed, or is [`FrameNumber::NONE`]. Such calls belong to a replay.
    pub fn first_visit(&mut self, frame: FrameNumber) -> Option<FirstVisit> {
        if !frame.is_valid() || frame <= self.last {
            warn!(
                "refusing first visit out of capture order: frame={frame}, last={}",
                self.last
            );
            return None;
        }
        self.last = frame;
        Some(FirstVisit::new(frame))
    }

    /// Most recent frame claimed by the writing pass.
    #[must_use]
    pub fn last_visited(&self) -> Option<FrameNumber> { self.last.is_valid().then_some(self.last) }

    /// Report whether `frame` has already been visited by the writing pass.
    #[must_use]
    pub fn has_visited(&self, frame: FrameNumber) -> bool { frame.is_valid() && frame <= self.last }

    /// Forget every visit, as when a capture is reloaded from the start.
    pub fn reset(&mut self) { self.last = FrameNumber::NONE; }
}
