//! Per-fragment results and recoverable warnings.

use super::ReassembledMessage;
use crate::frame_store::FrameNumber;

/// What the caller should do with a submitted fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Not part of a multi-frame message; dissect the payload directly.
    NotFragmented,
    /// Part of a message that is not decoded here. `reassembled_in` names the
    /// completing frame once known (always `None` on the writing pass).
    Fragment {
        /// Frame in which the message was completed, if it was.
        reassembled_in: Option<FrameNumber>,
    },
    /// This fragment completed the message on the writing pass; dissect the
    /// freshly assembled payload.
    CompletesFirstPass(ReassembledMessage),
    /// This fragment completed the message earlier; dissect the cached
    /// payload.
    CompletesReplay(ReassembledMessage),
}

impl Status {
    /// The assembled message, when this fragment completed one.
    #[must_use]
    pub fn message(&self) -> Option<&ReassembledMessage> {
        match self {
            Self::CompletesFirstPass(message) | Self::CompletesReplay(message) => Some(message),
            Self::NotFragmented | Self::Fragment { .. } => None,
        }
    }

    /// Frame in which this fragment's message was completed, if known.
    #[must_use]
    pub fn reassembled_in(&self) -> Option<FrameNumber> {
        match self {
            Self::Fragment { reassembled_in } => *reassembled_in,
            Self::CompletesFirstPass(message) | Self::CompletesReplay(message) => {
                Some(message.completed_in())
            }
            Self::NotFragmented => None,
        }
    }

    /// Report whether the fragment belongs to a multi-frame message.
    #[must_use]
    pub const fn is_fragment(&self) -> bool { !matches!(self, Self::NotFragmented) }
}

/// A recoverable inconsistency, annotated on the frame instead of aborting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A length did not fit: a fragment overflowed its message, a declared
    /// length exceeded the configured cap, a terminal fragment arrived short
    /// of the declared length, or a header was too short to parse.
    /// The message keeps as many bytes as fit.
    MalformedLength {
        /// Bytes the message could hold.
        expected: usize,
        /// Bytes that were offered.
        actual: usize,
    },
    /// A continuation with no message in progress; not reassembled.
    OrphanFragment,
}

impl Warning {
    /// Short label used for metrics.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::MalformedLength { .. } => "malformed_length",
            Self::OrphanFragment => "orphan_fragment",
        }
    }
}

/// Result of submitting one fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    /// How the caller should dissect the fragment.
    pub status: Status,
    /// Inconsistencies detected while handling it.
    pub warnings: Vec<Warning>,
}

impl Submission {
    pub(crate) const fn new(status: Status) -> Self {
        Self {
            status,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn with_warnings(status: Status, warnings: Vec<Warning>) -> Self {
        Self { status, warnings }
    }
}
