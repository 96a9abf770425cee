//! Limits applied while accumulating fragments.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Largest message accepted by default: a 16-bit length plus room for a
/// sub-header and its optional prefix.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65_535 + 64;

/// Settings bounding the memory a single reassembly may claim.
///
/// Declared lengths come from untrusted headers, so the engine never reserves
/// more than `max_message_size` bytes for one message. Longer declarations
/// are clamped and reported as malformed.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use framestate::ReassemblyConfig;
///
/// let config = ReassemblyConfig::default()
///     .with_max_message_size(NonZeroUsize::new(1500).expect("non-zero"));
/// assert_eq!(config.max_message_size.get(), 1500);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Hard cap on a reassembled message.
    pub max_message_size: NonZeroUsize,
}

impl ReassemblyConfig {
    /// Replace the message size cap.
    #[must_use]
    pub const fn with_max_message_size(mut self, max_message_size: NonZeroUsize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_message_size: NonZeroUsize::new(DEFAULT_MAX_MESSAGE_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}
