//! The length sub-header carried at the start of a first fragment.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Flag bit announcing a prefix after the fixed sub-header fields.
pub const PREFIX_PRESENT: u8 = 0x01;

/// Bytes taken by `pdu_len` and `flags`.
pub const FIXED_LEN: usize = 3;

/// Errors raised while reading or writing a [`SubHeader`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SubHeaderError {
    /// Fewer bytes than the sub-header needs.
    #[error("sub-header truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes the sub-header occupies.
        needed: usize,
        /// Bytes present in the fragment.
        available: usize,
    },
    /// A PDU longer than the 16-bit length field can declare.
    #[error("PDU of {len} bytes exceeds 65535")]
    PduTooLong {
        /// Offered PDU length.
        len: usize,
    },
    /// A prefix longer than the 8-bit length field can declare.
    #[error("prefix of {len} bytes exceeds 255")]
    PrefixTooLong {
        /// Offered prefix length.
        len: usize,
    },
    /// A prefix that does not match the declared `prefix_len`.
    #[error("prefix of {actual} bytes does not match declared length {declared}")]
    PrefixLength {
        /// Length the sub-header declares.
        declared: usize,
        /// Length of the prefix offered.
        actual: usize,
    },
}

/// Little-endian `pdu_len: u16`, `flags: u8`, then an optional
/// `prefix_len: u8` and prefix when `flags & 0x01` is set.
///
/// # Examples
///
/// ```
/// use framestate::boundary::SubHeader;
///
/// let header = SubHeader::new(300, Some(2));
/// let mut first: Vec<u8> = Vec::new();
/// header.write(&mut first, b"ab").expect("prefix fits");
/// first.extend_from_slice(b"body");
///
/// assert_eq!(header.encoded_len(), 6);
/// assert_eq!(header.expected_total(), 306);
/// assert_eq!(SubHeader::parse(&first), Ok(header));
/// assert_eq!(SubHeader::expected_len(&first), Some(306));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubHeader {
    pdu_len: u16,
    prefix_len: Option<u8>,
}

impl SubHeader {
    /// Describe a PDU of `pdu_len` bytes with an optional prefix.
    #[must_use]
    pub const fn new(pdu_len: u16, prefix_len: Option<u8>) -> Self { Self { pdu_len, prefix_len } }

    /// Length of the PDU that follows the sub-header and prefix.
    #[must_use]
    pub const fn pdu_len(&self) -> u16 { self.pdu_len }

    /// Length of the prefix, if one is present.
    #[must_use]
    pub const fn prefix_len(&self) -> Option<u8> { self.prefix_len }

    /// Bytes taken by the sub-header and its prefix.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FIXED_LEN + self.prefix_len.map_or(0, |len| 1 + usize::from(len))
    }

    /// Total bytes of the reassembled message this sub-header announces.
    #[must_use]
    pub fn expected_total(&self) -> usize { self.encoded_len() + usize::from(self.pdu_len) }

    /// Read a sub-header from the start of `first`.
    ///
    /// # Errors
    ///
    /// Returns [`SubHeaderError::Truncated`] when `first` ends before the
    /// sub-header or its prefix does.
    pub fn parse(first: &[u8]) -> Result<Self, SubHeaderError> {
        let truncated = |needed| SubHeaderError::Truncated {
            needed,
            available: first.len(),
        };
        let mut buf = first;
        if buf.remaining() < FIXED_LEN {
            return Err(truncated(FIXED_LEN));
        }
        let pdu_len = buf.get_u16_le();
        let flags = buf.get_u8();
        if flags & PREFIX_PRESENT == 0 {
            return Ok(Self::new(pdu_len, None));
        }

        if !buf.has_remaining() {
            return Err(truncated(FIXED_LEN + 1));
        }
        let header = Self::new(pdu_len, Some(buf.get_u8()));
        if first.len() < header.encoded_len() {
            return Err(truncated(header.encoded_len()));
        }
        Ok(header)
    }

    /// Expected message length declared by `first`, if it can be read.
    #[must_use]
    pub fn expected_len(first: &[u8]) -> Option<usize> {
        Self::parse(first)
            .ok()
            .map(|header| header.expected_total())
    }

    /// Split a complete message into its sub-header, prefix and PDU.
    ///
    /// The PDU is whatever follows the prefix; a clipped message yields a
    /// shorter PDU than `pdu_len` announces.
    ///
    /// # Errors
    ///
    /// Returns [`SubHeaderError::Truncated`] when the sub-header itself is
    /// incomplete.
    pub fn split(message: &[u8]) -> Result<(Self, &[u8], &[u8]), SubHeaderError> {
        let header = Self::parse(message)?;
        let start = header.encoded_len();
        let prefix_start = start - usize::from(header.prefix_len.unwrap_or(0));
        Ok((header, &message[prefix_start..start], &message[start..]))
    }

    /// Append this sub-header and `prefix` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`SubHeaderError::PrefixLength`] when `prefix` is not exactly
    /// `prefix_len` bytes long.
    pub fn write<B: BufMut>(&self, dst: &mut B, prefix: &[u8]) -> Result<(), SubHeaderError> {
        let declared = usize::from(self.prefix_len.unwrap_or(0));
        if prefix.len() != declared {
            return Err(SubHeaderError::PrefixLength {
                declared,
                actual: prefix.len(),
            });
        }

        dst.put_u16_le(self.pdu_len);
        match self.prefix_len {
            Some(len) => {
                dst.put_u8(PREFIX_PRESENT);
                dst.put_u8(len);
                dst.put_slice(prefix);
            }
            None => dst.put_u8(0),
        }
        Ok(())
    }
}
