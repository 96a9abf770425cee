#![doc(html_root_url = "https://docs.rs/framestate/latest")]
//! Per-frame state for packet-dissection engines.
//!
//! A dissector visits every frame of a capture once in order, then revisits
//! frames any number of times in any order while the user scrolls, filters
//! or redraws. This crate keeps the answers of those revisits identical to
//! the first pass:
//!
//! - [`FrameStore`] indexes per-frame records by frame number in a radix
//!   tree that grows by whole levels.
//! - [`IntervalTable`] and [`LifetimeTable`] answer "what was the value for
//!   this key as of frame N", including reused handles.
//! - [`reassembly::FragmentEngine`] stitches multi-frame messages together
//!   and reports every contributing frame against the same result.
//! - [`boundary::BoundaryStream`] composes the two for boundary-flag
//!   delimited links.
//! - [`Capture`] owns all of it for one loaded capture and hands out the
//!   [`FirstVisit`] capability that gates every write.

pub mod boundary;
pub mod capture;
mod error;
pub mod frame_store;
pub mod interval;
pub mod metrics;
pub mod reassembly;

pub use capture::{CallScope, Capture, Dissected, FirstVisit, Visit, VisitGate};
pub use error::ResourceExhausted;
pub use frame_store::{DEFAULT_LEVEL_BITS, FrameNumber, FrameStore, TeardownReport};
pub use interval::{IntervalTable, Lifetime, LifetimeTable, RecordOutcome, Timeline};
pub use reassembly::{ReassemblyConfig, Status, Submission, Warning};
