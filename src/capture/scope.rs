//! Per-call dissection scope.

use crate::{
    capture::{FirstVisit, Visit},
    frame_store::FrameNumber,
    reassembly::Warning,
};

/// State that lives for exactly one dissection call.
///
/// The scope borrows its [`Visit`], so nothing stored in it can outlive the
/// call that created it. Warnings noted here are returned to the host with
/// the dissection output and then dropped.
#[derive(Debug)]
pub struct CallScope<'v> {
    visit: Visit<'v>,
    warnings: Vec<Warning>,
}

impl<'v> CallScope<'v> {
    /// Open a scope for `visit`.
    #[must_use]
    pub fn new(visit: Visit<'v>) -> Self {
        Self {
            visit,
            warnings: Vec::new(),
        }
    }

    /// How this call sees its frame.
    #[must_use]
    pub const fn visit(&self) -> Visit<'v> { self.visit }

    /// Frame being dissected.
    #[must_use]
    pub const fn frame(&self) -> FrameNumber { self.visit.frame() }

    /// Write capability, present only during the writing pass.
    #[must_use]
    pub const fn first_visit(&self) -> Option<&'v FirstVisit> { self.visit.first() }

    /// Attach a warning annotation to the frame.
    pub fn note(&mut self, warning: Warning) { self.warnings.push(warning); }

    /// Attach every warning from `warnings`.
    pub fn note_all(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        self.warnings.extend(warnings);
    }

    /// Warnings noted so far.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] { &self.warnings }

    pub(crate) fn into_warnings(self) -> Vec<Warning> { self.warnings }
}
