//! Test helpers for `framestate`: scripted link captures and serialised
//! access to captured log records.
//!
//! ```
//! use framestate::boundary::{ConnectionKey, Direction, Role};
//! use framestate_testing::CaptureScript;
//!
//! let link = ConnectionKey::new(0, 7);
//! let loaded = CaptureScript::new(8)
//!     .connect(link, Role::Slave)
//!     .pdu(link, Direction::Received, b"a longer payload", &[])
//!     .disconnect(link)
//!     .load();
//! let last = loaded.frame_count() - 1;
//! let replayed = loaded.replay(last);
//! let message = replayed
//!     .output
//!     .submission()
//!     .and_then(|submission| submission.status.message())
//!     .expect("frame completes the PDU");
//! assert_eq!(message.payload().len(), 19);
//! ```

pub mod capture;
pub mod logging;

pub use capture::{CaptureScript, LoadedCapture};
pub use logging::{LoggerHandle, logger};
