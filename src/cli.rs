//! Command line interface for the `framestate` demonstration binary.
//!
//! The same definition feeds the man page generated by `build.rs`.

use std::num::NonZeroUsize;

use clap::Parser;

/// Synthesise a boundary-flag capture, dissect it once, then replay it in
/// several orders and check that every replay agrees.
#[derive(Debug, Parser)]
#[command(name = "framestate", version, about = "Replay-stable per-frame state demonstration")]
pub struct Cli {
    /// Number of frames to synthesise.
    #[arg(long, default_value_t = 10_000)]
    pub frames: u32,
    /// Length of every synthesised PDU in bytes.
    #[arg(long, default_value_t = 600)]
    pub pdu_len: u16,
    /// Largest fragment payload in bytes.
    #[arg(long, default_value = "27")]
    pub segment: NonZeroUsize,
    /// Connection handles interleaved on the link.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub handles: u16,
}
