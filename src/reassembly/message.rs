//! Identifiers and the immutable output of a completed reassembly.

use bytes::Bytes;
use derive_more::{Display, From, Into};

use crate::frame_store::FrameNumber;

/// Engine-assigned identifier of one logical message.
///
/// # Examples
///
/// ```
/// use framestate::reassembly::MessageId;
/// let id = MessageId::new(3);
/// assert_eq!(id.get(), 3);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0}")]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    pub(crate) fn index(self) -> Option<usize> { usize::try_from(self.0).ok() }
}

/// A message stitched together from the fragments of several frames.
///
/// The payload is reference counted; cloning a message for a replay does not
/// copy its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledMessage {
    id: MessageId,
    first_frame: FrameNumber,
    completed_in: FrameNumber,
    fragments: u32,
    payload: Bytes,
}

impl ReassembledMessage {
    pub(crate) fn new(
        id: MessageId,
        first_frame: FrameNumber,
        completed_in: FrameNumber,
        fragments: u32,
        payload: Bytes,
    ) -> Self {
        Self {
            id,
            first_frame,
            completed_in,
            fragments,
            payload,
        }
    }

    /// Identifier of the message.
    #[must_use]
    pub const fn id(&self) -> MessageId { self.id }

    /// Frame carrying the first fragment.
    #[must_use]
    pub const fn first_frame(&self) -> FrameNumber { self.first_frame }

    /// Frame carrying the fragment that completed the message.
    #[must_use]
    pub const fn completed_in(&self) -> FrameNumber { self.completed_in }

    /// Number of fragments that contributed bytes or markers.
    #[must_use]
    pub const fn fragments(&self) -> u32 { self.fragments }

    /// Borrow the reassembled bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Cheap shared handle to the reassembled bytes.
    #[must_use]
    pub fn bytes(&self) -> Bytes { self.payload.clone() }

    /// Consume the message, returning its bytes.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}
