//! Multi-frame message reassembly.
//!
//! Protocols that split one logical message across several frames submit
//! each fragment to a [`FragmentEngine`] together with a
//! [`CompletionPolicy`] that says where the fragment sits in its message.
//! The engine accumulates bytes on the writing pass and answers replays
//! from its records, so a replay never mutates reassembly state.

mod config;
mod engine;
mod message;
mod policy;
mod status;

pub use config::{DEFAULT_MAX_MESSAGE_SIZE, ReassemblyConfig};
pub use engine::FragmentEngine;
pub use message::{MessageId, ReassembledMessage};
pub use policy::{BoundaryFlag, Completion, CompletionPolicy, FlagDriven, LengthDriven, Position};
pub use status::{Status, Submission, Warning};

#[cfg(test)]
mod tests;
