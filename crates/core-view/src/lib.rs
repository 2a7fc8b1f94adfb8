//! Part model for the glint render orchestrator.
//!
//! A *part* is one renderable unit of the composed view (text rows, an
//! overlay, a status row). Parts self-report staleness through a dirty flag
//! and participate in a strict two-phase pass: `prepare` computes geometry
//! against an immutable [`ViewportSnapshot`], `commit` applies that geometry
//! to the presentation surface.
//!
//! Why a trait instead of capability probing?
//! ------------------------------------------
//! The part surface is an explicit seam: every variant implements
//! [`ViewPart`] in full. There is no "does this object have a render
//! method" check anywhere downstream; the registry stores trait objects and
//! the pass calls the same four methods on each.
//!
//! Core invariants (must hold after every public call):
//! * `prepare` never mutates the surface; all surface mutation happens in
//!   `commit` consuming the [`PartLayout`] value `prepare` returned.
//! * A part clears its own dirty flag at the end of a successful `commit`;
//!   the pass never touches part flags (own-state discipline).
//! * A part whose `commit` fails keeps its flag set and is re-rendered by
//!   the next cycle.

use anyhow::Result;

mod registry;
mod snapshot;

pub use registry::{PartId, PartRegistry};
pub use snapshot::{SelectionSpan, ViewportSnapshot};

/// Self-reported staleness flag embedded by part implementations.
///
/// `mark` and `force` are equivalent at the flag level; `force` exists so
/// full-relayout call sites (resize, theme change) read explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirtyFlag {
    set: bool,
}

impl DirtyFlag {
    pub fn new() -> Self {
        Self { set: false }
    }

    pub fn mark(&mut self) {
        self.set = true;
    }

    pub fn force(&mut self) {
        self.set = true;
    }

    pub fn clear(&mut self) {
        self.set = false;
    }

    pub fn is_set(&self) -> bool {
        self.set
    }
}

/// Geometry for one screen row produced by `prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    /// Screen row (viewport-relative).
    pub row: u16,
    /// Text to place at column 0 after clearing, empty for overlay-only rows.
    pub text: String,
    /// Half-open reverse-video column spans.
    pub reverse_spans: Vec<(u16, u16)>,
}

impl RowLayout {
    pub fn text(row: u16, text: String) -> Self {
        Self {
            row,
            text,
            reverse_spans: Vec::new(),
        }
    }

    pub fn overlay(row: u16, reverse_spans: Vec<(u16, u16)>) -> Self {
        Self {
            row,
            text: String::new(),
            reverse_spans,
        }
    }
}

/// Value-returning geometry computed by `prepare` and consumed by `commit`.
///
/// Keeping this an explicit value (rather than letting `prepare` mutate the
/// surface as a side effect) means the read phase of a pass completes for
/// every part before any part writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartLayout {
    pub rows: Vec<RowLayout>,
}

impl PartLayout {
    /// Layout with nothing to paint (dirty part fully outside the viewport).
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Minimal mutation surface a part commits into.
///
/// Implemented by the render crate's cell grid and by test fakes; parts see
/// nothing of the terminal.
pub trait PartSurface {
    fn set_text(&mut self, row: u16, col: u16, text: &str);
    fn apply_reverse(&mut self, row: u16, start_col: u16, end_col: u16);
    fn clear_row(&mut self, row: u16);
}

/// One renderable unit owned by a [`PartRegistry`].
pub trait ViewPart {
    /// Stable identifier used in traces and pass outcomes.
    fn name(&self) -> &'static str;

    /// Whether this part's presentation state is stale.
    fn needs_render(&self) -> bool;

    /// Mark dirty unconditionally (full-relayout events such as resize).
    fn force_should_render(&mut self);

    /// Read phase: compute geometry for the given snapshot. Must not touch
    /// the surface.
    fn prepare(&mut self, snapshot: &ViewportSnapshot) -> Result<PartLayout>;

    /// Write phase: apply previously computed geometry. Clears the part's
    /// dirty flag on success.
    fn commit(&mut self, layout: &PartLayout, surface: &mut dyn PartSurface) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_flag_lifecycle() {
        let mut flag = DirtyFlag::new();
        assert!(!flag.is_set());
        flag.mark();
        assert!(flag.is_set());
        flag.clear();
        assert!(!flag.is_set());
        flag.force();
        assert!(flag.is_set());
    }

    #[test]
    fn empty_layout_reports_empty() {
        assert!(PartLayout::empty().is_empty());
        let layout = PartLayout {
            rows: vec![RowLayout::text(0, "x".into())],
        };
        assert!(!layout.is_empty());
    }
}
