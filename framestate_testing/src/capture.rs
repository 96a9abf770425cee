//! Scripted link captures.

use std::num::NonZeroUsize;

use bytes::Bytes;
use framestate::{
    Capture,
    Dissected,
    FrameNumber,
    ReassemblyConfig,
    boundary::{
        BoundaryStream,
        ConnectionKey,
        Direction,
        EventOutcome,
        LinkEvent,
        Role,
        Segmenter,
    },
    reassembly::BoundaryFlag,
};

/// Builder for a sequence of link events, one per frame.
///
/// ```
/// use framestate::boundary::{ConnectionKey, Direction, Role};
/// use framestate_testing::CaptureScript;
///
/// let link = ConnectionKey::new(0, 1);
/// let loaded = CaptureScript::new(4)
///     .connect(link, Role::Master)
///     .pdu(link, Direction::Sent, b"hello", &[])
///     .load();
/// assert_eq!(loaded.frame_count(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct CaptureScript {
    segmenter: Segmenter,
    events: Vec<LinkEvent>,
}

impl CaptureScript {
    /// Start a script whose PDUs are split into fragments of at most
    /// `max_fragment` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `max_fragment` is zero.
    #[must_use]
    pub fn new(max_fragment: usize) -> Self {
        let max = NonZeroUsize::new(max_fragment).expect("fragment size must be non-zero");
        Self {
            segmenter: Segmenter::new(max),
            events: Vec::new(),
        }
    }

    /// Add a connect event.
    #[must_use]
    pub fn connect(mut self, link: ConnectionKey, role: Role) -> Self {
        self.events.push(LinkEvent::Connect { link, role });
        self
    }

    /// Add a disconnect event.
    #[must_use]
    pub fn disconnect(mut self, link: ConnectionKey) -> Self {
        self.events.push(LinkEvent::Disconnect { link });
        self
    }

    /// Add one raw fragment.
    #[must_use]
    pub fn fragment(
        mut self,
        link: ConnectionKey,
        direction: Direction,
        flag: BoundaryFlag,
        payload: &[u8],
    ) -> Self {
        self.events.push(LinkEvent::Fragment {
            link,
            direction,
            flag,
            payload: Bytes::copy_from_slice(payload),
        });
        self
    }

    /// Add every fragment of `pdu`, one per frame.
    ///
    /// # Panics
    ///
    /// Panics if `pdu` or `prefix` do not fit the sub-header fields.
    #[must_use]
    pub fn pdu(mut self, link: ConnectionKey, direction: Direction, pdu: &[u8], prefix: &[u8]) -> Self {
        let fragments = self
            .segmenter
            .events(link, direction, pdu, prefix)
            .expect("PDU fits the sub-header");
        self.events.extend(fragments);
        self
    }

    /// Events scripted so far.
    #[must_use]
    pub fn events(&self) -> &[LinkEvent] { &self.events }

    /// Run the writing pass with default reassembly limits.
    #[must_use]
    pub fn load(self) -> LoadedCapture { self.load_with(ReassemblyConfig::default()) }

    /// Run the writing pass with `config`.
    ///
    /// # Panics
    ///
    /// Panics if the capture runs out of memory.
    #[must_use]
    pub fn load_with(self, config: ReassemblyConfig) -> LoadedCapture {
        let mut capture = Capture::open(BoundaryStream::new(config));
        let mut first_pass = Vec::with_capacity(self.events.len());
        for event in self.events {
            let dissected = capture
                .ingest(event, |stream, event, scope| stream.dissect(scope, event))
                .expect("frame stored");
            let Dissected {
                frame,
                output,
                warnings,
            } = dissected;
            first_pass.push(Dissected {
                frame,
                output: output.expect("reassembly memory available"),
                warnings,
            });
        }
        LoadedCapture {
            capture,
            first_pass,
        }
    }
}

/// A capture after its writing pass.
#[derive(Debug)]
pub struct LoadedCapture {
    /// The capture epoch holding every frame and the link state.
    pub capture: Capture<LinkEvent, BoundaryStream>,
    /// Output of the writing pass, indexed by frame number minus one.
    pub first_pass: Vec<Dissected<EventOutcome>>,
}

impl LoadedCapture {
    /// Number of ingested frames.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        u32::try_from(self.capture.frame_count()).expect("test captures are small")
    }

    /// Writing-pass output for `frame`.
    ///
    /// # Panics
    ///
    /// Panics if `frame` was not ingested.
    #[must_use]
    pub fn first(&self, frame: u32) -> &Dissected<EventOutcome> {
        let index = usize::try_from(frame).expect("small frame") - 1;
        &self.first_pass[index]
    }

    /// Dissect `frame` again.
    ///
    /// # Panics
    ///
    /// Panics if `frame` was not ingested.
    #[must_use]
    pub fn replay(&self, frame: u32) -> Dissected<EventOutcome> {
        self.capture
            .redissect(FrameNumber::new(frame), |stream, event, scope| {
                stream.redissect(scope, event)
            })
            .expect("frame ingested")
    }

    /// Dissect frames again in `order`.
    #[must_use]
    pub fn replay_order(&self, order: impl IntoIterator<Item = u32>) -> Vec<Dissected<EventOutcome>> {
        order.into_iter().map(|frame| self.replay(frame)).collect()
    }
}
