//! Dense, one-based frame numbering.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Position of a frame within a loaded capture.
///
/// Valid frame numbers start at 1 and are assigned densely in capture order.
/// [`FrameNumber::NONE`] (zero) never names a frame and is used as a
/// sentinel by callers that need a "no frame" value inside composite keys.
///
/// # Examples
///
/// ```
/// use framestate::FrameNumber;
/// let frame = FrameNumber::new(12);
/// assert_eq!(frame.get(), 12);
/// assert_eq!(frame.prev(), Some(FrameNumber::new(11)));
/// assert!(!FrameNumber::NONE.is_valid());
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[display("{_0}")]
pub struct FrameNumber(u32);

impl FrameNumber {
    /// Sentinel that never names a frame.
    pub const NONE: Self = Self(0);
    /// The first frame of every capture.
    pub const FIRST: Self = Self(1);
    /// Open-ended upper bound used for lifetimes that have not ended.
    pub const MAX: Self = Self(u32::MAX);

    /// Wrap a raw frame number.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the raw frame number.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Report whether this value can name a frame.
    #[must_use]
    pub const fn is_valid(self) -> bool { self.0 != 0 }

    /// The preceding frame, or `None` at the start of the capture.
    #[must_use]
    pub fn prev(self) -> Option<Self> { self.0.checked_sub(1).filter(|n| *n != 0).map(Self) }

    /// The following frame, or `None` once the numbering space is exhausted.
    #[must_use]
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).filter(|n| *n != u32::MAX).map(Self)
    }

    /// Zero-based storage slot for this frame.
    pub(crate) fn slot(self) -> Option<u64> { u64::from(self.0).checked_sub(1) }
}
