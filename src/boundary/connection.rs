//! Connection identity and the keys fragments are reassembled under.

use derive_more::Display;

use crate::frame_store::FrameNumber;

/// A connection handle on one adapter.
///
/// Handles are reused once a connection ends, so a key alone does not name a
/// connection; pair it with the frame that opened it (see [`SessionKey`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{adapter}/{handle:#06x}")]
pub struct ConnectionKey {
    /// Adapter the handle belongs to.
    pub adapter: u16,
    /// Connection handle assigned by the adapter.
    pub handle: u16,
}

impl ConnectionKey {
    /// Name `handle` on `adapter`.
    #[must_use]
    pub const fn new(adapter: u16, handle: u16) -> Self { Self { adapter, handle } }
}

/// Role of the local side on a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Role {
    /// The local side initiated the connection.
    Master,
    /// The peer initiated the connection.
    Slave,
}

/// What the connect event told us about a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Role of the local side.
    pub role: Role,
}

impl ConnectionInfo {
    /// Describe a connection in `role`.
    #[must_use]
    pub const fn new(role: Role) -> Self { Self { role } }
}

/// Direction of a fragment relative to the local side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Direction {
    /// Sent by the local side.
    Sent,
    /// Received from the peer.
    Received,
}

/// Reassembly key for one direction of one connection lifetime.
///
/// `opened_in` is the frame of the connect event, or [`FrameNumber::NONE`]
/// for traffic on a handle with no known connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    /// The handle the fragment arrived on.
    pub connection: ConnectionKey,
    /// Frame that opened the connection.
    pub opened_in: FrameNumber,
    /// Which side sent the fragment.
    pub direction: Direction,
}
