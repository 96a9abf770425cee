//! Outbound helper that splits PDUs into boundary-flag fragments.

use std::num::NonZeroUsize;

use bytes::{Bytes, BytesMut};

use super::{ConnectionKey, Direction, LinkEvent, SubHeader, SubHeaderError};
use crate::reassembly::BoundaryFlag;

/// Splits PDUs into transport-sized fragments behind a [`SubHeader`].
///
/// The first fragment starts with the sub-header and optional prefix and
/// always carries all of both, even past the fragment size, so the receiver
/// can read the declared length from it. The last is flagged
/// [`BoundaryFlag::Last`]. A PDU that fits in one fragment is
/// sent as a lone [`BoundaryFlag::First`] whose declared length it already
/// satisfies.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use framestate::{boundary::Segmenter, reassembly::BoundaryFlag};
///
/// let segmenter = Segmenter::new(NonZeroUsize::new(4).expect("non-zero"));
/// let fragments = segmenter.segment(b"hello", &[]).expect("lengths fit");
/// let flags: Vec<_> = fragments.iter().map(|(flag, _)| *flag).collect();
/// assert_eq!(flags, [BoundaryFlag::First, BoundaryFlag::Last]);
/// assert_eq!(fragments[1].1.as_ref(), b"ello");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Segmenter {
    max_fragment_size: NonZeroUsize,
}

impl Segmenter {
    /// Create a segmenter that caps fragment payloads at `max_fragment_size`.
    #[must_use]
    pub const fn new(max_fragment_size: NonZeroUsize) -> Self { Self { max_fragment_size } }

    /// Return the maximum fragment payload size in bytes.
    #[must_use]
    pub const fn max_fragment_size(&self) -> NonZeroUsize { self.max_fragment_size }

    /// Split `pdu`, preceded by its sub-header and `prefix`, into fragments.
    ///
    /// # Errors
    ///
    /// Returns [`SubHeaderError::PduTooLong`] or
    /// [`SubHeaderError::PrefixTooLong`] when a length does not fit its
    /// sub-header field.
    pub fn segment(
        &self,
        pdu: &[u8],
        prefix: &[u8],
    ) -> Result<Vec<(BoundaryFlag, Bytes)>, SubHeaderError> {
        let pdu_len =
            u16::try_from(pdu.len()).map_err(|_| SubHeaderError::PduTooLong { len: pdu.len() })?;
        let prefix_len = if prefix.is_empty() {
            None
        } else {
            Some(
                u8::try_from(prefix.len())
                    .map_err(|_| SubHeaderError::PrefixTooLong { len: prefix.len() })?,
            )
        };
        let header = SubHeader::new(pdu_len, prefix_len);

        let mut message = BytesMut::with_capacity(header.expected_total());
        header.write(&mut message, prefix)?;
        message.extend_from_slice(pdu);
        let message = message.freeze();

        let max = self.max_fragment_size.get();
        let total = message.len();
        let mut fragments = Vec::with_capacity(total.div_ceil(max));
        let mut offset = 0;
        while offset < total {
            let room = if offset == 0 { max.max(header.encoded_len()) } else { max };
            let end = (offset + room).min(total);
            let flag = match (offset, end == total) {
                (0, _) => BoundaryFlag::First,
                (_, true) => BoundaryFlag::Last,
                (_, false) => BoundaryFlag::Continuation,
            };
            fragments.push((flag, message.slice(offset..end)));
            offset = end;
        }
        Ok(fragments)
    }

    /// Segment `pdu` into fragment events for one direction of `link`.
    ///
    /// # Errors
    ///
    /// Returns [`SubHeaderError`] under the same conditions as
    /// [`Segmenter::segment`].
    pub fn events(
        &self,
        link: ConnectionKey,
        direction: Direction,
        pdu: &[u8],
        prefix: &[u8],
    ) -> Result<Vec<LinkEvent>, SubHeaderError> {
        Ok(self
            .segment(pdu, prefix)?
            .into_iter()
            .map(|(flag, payload)| LinkEvent::Fragment {
                link,
                direction,
                flag,
                payload,
            })
            .collect())
    }
}
