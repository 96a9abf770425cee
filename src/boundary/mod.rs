//! Boundary-flag delimited streams.
//!
//! Transports such as an HCI ACL link split each higher-layer PDU into a
//! first fragment and continuations. The first fragment opens with a
//! [`SubHeader`] declaring the PDU length, optionally followed by a prefix
//! that only the first fragment carries. [`BoundaryStream`] ties those
//! fragments to the connection lifetime they arrived in and reassembles them
//! through a [`FragmentEngine`](crate::reassembly::FragmentEngine).

mod connection;
mod event;
mod segmenter;
mod stream;
mod subheader;

pub use connection::{ConnectionInfo, ConnectionKey, Direction, Role, SessionKey};
pub use event::{EventOutcome, LinkEvent};
pub use segmenter::Segmenter;
pub use stream::BoundaryStream;
pub use subheader::{FIXED_LEN, PREFIX_PRESENT, SubHeader, SubHeaderError};

#[cfg(test)]
mod tests;
