//! Pluggable rules deciding where a message starts and ends.
//!
//! The engine never parses protocol headers. A [`CompletionPolicy`] looks at
//! the caller's parsed header (and the fragment payload, for protocols that
//! declare lengths inside the first fragment) and reports the fragment's
//! [`Position`]. Two ready-made policies cover boundary-flag streams:
//! [`FlagDriven`] ends a message on its `Last` fragment, [`LengthDriven`]
//! ends it once the length declared by the `First` fragment has arrived.

/// How a message declares its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The message is complete once this many bytes have accumulated.
    Length(usize),
    /// The message is complete when a terminal fragment arrives.
    Terminal,
}

/// Where a fragment sits within its message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// A whole message in one fragment; no reassembly needed.
    Unfragmented,
    /// The first fragment of a new message.
    First(Completion),
    /// A later fragment. `terminal` marks the last one for flag-driven
    /// messages and is advisory for length-driven ones.
    Continuation {
        /// Whether the protocol marks this fragment as the last.
        terminal: bool,
    },
}

/// Classifies fragments for the engine.
pub trait CompletionPolicy<H: ?Sized> {
    /// Report where the fragment described by `header` sits in its message.
    fn classify(&self, header: &H, payload: &[u8]) -> Position;
}

impl<H: ?Sized, F> CompletionPolicy<H> for F
where
    F: Fn(&H, &[u8]) -> Position,
{
    fn classify(&self, header: &H, payload: &[u8]) -> Position { self(header, payload) }
}

/// Packet-boundary marker carried by a transport header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryFlag {
    /// Starts a message that continues in later fragments.
    First,
    /// Continues the current message.
    Continuation,
    /// Ends the current message.
    Last,
    /// A whole message; bypasses reassembly.
    Complete,
}

/// End messages on their [`BoundaryFlag::Last`] fragment.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagDriven;

impl CompletionPolicy<BoundaryFlag> for FlagDriven {
    fn classify(&self, flag: &BoundaryFlag, _payload: &[u8]) -> Position {
        match flag {
            BoundaryFlag::Complete => Position::Unfragmented,
            BoundaryFlag::First => Position::First(Completion::Terminal),
            BoundaryFlag::Continuation => Position::Continuation { terminal: false },
            BoundaryFlag::Last => Position::Continuation { terminal: true },
        }
    }
}

/// End messages once the length declared in the first fragment has arrived.
///
/// `expected_len` reads the declared total from the first fragment's
/// payload. When it cannot (a truncated sub-header, say) the fragment is
/// treated as unfragmented so the caller can dissect what is there.
#[derive(Clone, Copy, Debug)]
pub struct LengthDriven<F> {
    expected_len: F,
}

impl<F> LengthDriven<F>
where
    F: Fn(&[u8]) -> Option<usize>,
{
    /// Build a policy around an expected-length reader.
    pub const fn new(expected_len: F) -> Self { Self { expected_len } }
}

impl<F> CompletionPolicy<BoundaryFlag> for LengthDriven<F>
where
    F: Fn(&[u8]) -> Option<usize>,
{
    fn classify(&self, flag: &BoundaryFlag, payload: &[u8]) -> Position {
        match flag {
            BoundaryFlag::Complete => Position::Unfragmented,
            BoundaryFlag::First => (self.expected_len)(payload)
                .map_or(Position::Unfragmented, |len| {
                    Position::First(Completion::Length(len))
                }),
            BoundaryFlag::Continuation => Position::Continuation { terminal: false },
            BoundaryFlag::Last => Position::Continuation { terminal: true },
        }
    }
}
