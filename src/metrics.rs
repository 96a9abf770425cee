//! Metric helpers for `framestate`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking dissected frames.
pub const FRAMES_DISSECTED: &str = "framestate_frames_dissected_total";
/// Name of the counter tracking completed reassemblies.
pub const MESSAGES_REASSEMBLED: &str = "framestate_messages_reassembled_total";
/// Name of the counter tracking reassembly warnings.
pub const REASSEMBLY_WARNINGS: &str = "framestate_reassembly_warnings_total";

/// Which pass dissected a frame.
#[derive(Clone, Copy, Debug)]
pub enum Pass {
    /// The writing pass that ingests frames.
    First,
    /// A read-only pass over ingested frames.
    Replay,
}

impl Pass {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Pass::First => "first",
            Pass::Replay => "replay",
        }
    }
}

/// Record a dissected frame for the given pass.
#[cfg(feature = "metrics")]
pub fn inc_frames(pass: Pass) {
    counter!(FRAMES_DISSECTED, "pass" => pass.as_str()).increment(1);
}

/// Record a completed reassembly.
#[cfg(feature = "metrics")]
pub fn inc_reassembled() { counter!(MESSAGES_REASSEMBLED).increment(1); }

/// Record a reassembly warning of the given kind.
#[cfg(feature = "metrics")]
pub fn inc_warnings(kind: &'static str) {
    counter!(REASSEMBLY_WARNINGS, "kind" => kind).increment(1);
}

/// Record a dissected frame for the given pass.
#[cfg(not(feature = "metrics"))]
pub fn inc_frames(_pass: Pass) {}

/// Record a completed reassembly.
#[cfg(not(feature = "metrics"))]
pub fn inc_reassembled() {}

/// Record a reassembly warning of the given kind.
#[cfg(not(feature = "metrics"))]
pub fn inc_warnings(_kind: &'static str) {}
