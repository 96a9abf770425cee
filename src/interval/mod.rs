//! As-of-frame history of identity and connection state.
//!
//! Dissectors record facts ("handle 0x0b belongs to adapter 0", "this
//! channel carries OBEX") while the capture is first read, and ask later
//! which fact was in effect at any given frame. Histories are append-only:
//! writes need a [`FirstVisit`](crate::FirstVisit) and must arrive in
//! capture order, reads never change anything.

mod lifetime;
mod table;
mod timeline;

pub use lifetime::{Lifetime, LifetimeTable};
pub use table::IntervalTable;
pub use timeline::{RecordOutcome, Timeline};
