//! The one fatal error shared by every capture-owned container.
//!
//! Everything else the engine reports (clipped lengths, orphaned fragments,
//! out-of-range frames) is a value, not an error. Running out of memory or
//! frame numbers is different: a capture cannot be partially indexed, so the
//! load of the current capture must stop.

use std::collections::TryReserveError;

use thiserror::Error;

/// Storage for the current capture could not be grown.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResourceExhausted {
    /// The allocator refused a block request.
    #[error("failed to allocate {what} after {frames} frames: {source}")]
    Allocation {
        /// The structure that was being grown.
        what: &'static str,
        /// Frames already stored when the request failed.
        frames: u64,
        /// Underlying allocator error.
        #[source]
        source: TryReserveError,
    },
    /// Every representable frame number has been handed out.
    #[error("frame number space exhausted after {frames} frames")]
    FrameNumbers {
        /// Frames already stored.
        frames: u64,
    },
}

/// Reserve exactly `additional` slots in `buf`, mapping failure to
/// [`ResourceExhausted::Allocation`].
pub(crate) fn reserve_exact<T>(
    buf: &mut Vec<T>,
    additional: usize,
    what: &'static str,
    frames: u64,
) -> Result<(), ResourceExhausted> {
    buf.try_reserve_exact(additional)
        .map_err(|source| ResourceExhausted::Allocation {
            what,
            frames,
            source,
        })
}

/// Reserve room for at least `additional` more elements in `buf`.
pub(crate) fn reserve<T>(
    buf: &mut Vec<T>,
    additional: usize,
    what: &'static str,
    frames: u64,
) -> Result<(), ResourceExhausted> {
    buf.try_reserve(additional)
        .map_err(|source| ResourceExhausted::Allocation {
            what,
            frames,
            source,
        })
}
