//! Selection overlay part: reverse-video spans over already painted text.
//!
//! The part carries no selection data of its own; the spans live in the
//! snapshot and the handle only marks the overlay stale when the driving loop
//! changes the selection set. Registration after the text part guarantees the
//! overlay commits onto the rows that pass just painted.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use core_view::{DirtyFlag, PartLayout, PartSurface, RowLayout, ViewPart, ViewportSnapshot};

use super::lock;

/// Driver-side handle: marks the overlay stale after a selection change.
#[derive(Debug, Clone)]
pub struct SelectionHandle {
    dirty: Arc<Mutex<DirtyFlag>>,
}

impl SelectionHandle {
    pub fn mark(&self) {
        lock(&self.dirty).mark();
    }
}

pub struct SelectionOverlayPart {
    dirty: Arc<Mutex<DirtyFlag>>,
}

impl SelectionOverlayPart {
    pub fn new() -> (Self, SelectionHandle) {
        let dirty = Arc::new(Mutex::new(DirtyFlag::new()));
        let handle = SelectionHandle {
            dirty: dirty.clone(),
        };
        (Self { dirty }, handle)
    }
}

impl ViewPart for SelectionOverlayPart {
    fn name(&self) -> &'static str {
        "selection_overlay"
    }

    fn needs_render(&self) -> bool {
        lock(&self.dirty).is_set()
    }

    fn force_should_render(&mut self) {
        lock(&self.dirty).force();
    }

    fn prepare(&mut self, snapshot: &ViewportSnapshot) -> Result<PartLayout> {
        let mut rows = Vec::new();
        for line in snapshot.visible_lines() {
            let Some(row) = snapshot.row_for_line(line) else {
                continue;
            };
            let spans: Vec<(u16, u16)> = snapshot
                .selections_on_line(line)
                .map(|s| (s.start_col, s.end_col.min(snapshot.width())))
                .filter(|(start, end)| start < end)
                .collect();
            if !spans.is_empty() {
                rows.push(RowLayout::overlay(row, spans));
            }
        }
        tracing::trace!(
            target: "render.parts",
            part = "selection_overlay",
            rows = rows.len(),
            "prepared"
        );
        Ok(PartLayout { rows })
    }

    fn commit(&mut self, layout: &PartLayout, surface: &mut dyn PartSurface) -> Result<()> {
        for row in &layout.rows {
            for &(start, end) in &row.reverse_spans {
                surface.apply_reverse(row.row, start, end);
            }
        }
        lock(&self.dirty).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellFlags, Surface};
    use core_view::SelectionSpan;

    #[test]
    fn spans_map_to_viewport_rows() {
        let (mut part, handle) = SelectionOverlayPart::new();
        handle.mark();
        let snap = ViewportSnapshot::new(
            10,
            4,
            0,
            20,
            vec![
                SelectionSpan::new(11, 2, 5),
                SelectionSpan::new(30, 0, 3), // outside viewport
            ],
        );
        let layout = part.prepare(&snap).unwrap();
        assert_eq!(layout.rows.len(), 1);
        assert_eq!(layout.rows[0].row, 1);
        assert_eq!(layout.rows[0].reverse_spans, vec![(2, 5)]);
    }

    #[test]
    fn spans_clip_to_viewport_width() {
        let (mut part, _handle) = SelectionOverlayPart::new();
        let snap = ViewportSnapshot::new(0, 2, 0, 8, vec![SelectionSpan::new(0, 6, 30)]);
        let layout = part.prepare(&snap).unwrap();
        assert_eq!(layout.rows[0].reverse_spans, vec![(6, 8)]);
    }

    #[test]
    fn span_fully_right_of_viewport_drops_out() {
        let (mut part, _handle) = SelectionOverlayPart::new();
        let snap = ViewportSnapshot::new(0, 2, 0, 8, vec![SelectionSpan::new(0, 10, 14)]);
        let layout = part.prepare(&snap).unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn commit_applies_reverse_and_clears_dirty() {
        let (mut part, handle) = SelectionOverlayPart::new();
        handle.mark();
        assert!(part.needs_render());
        let snap = ViewportSnapshot::new(0, 2, 0, 10, vec![SelectionSpan::new(0, 1, 4)]);
        let layout = part.prepare(&snap).unwrap();
        let mut surface = Surface::new(10, 3);
        part.commit(&layout, &mut surface).unwrap();
        assert!(!part.needs_render());
        assert!(surface.cell(0, 1).unwrap().flags.contains(CellFlags::REVERSE));
        assert!(surface.cell(0, 3).unwrap().flags.contains(CellFlags::REVERSE));
        assert!(!surface.cell(0, 4).unwrap().flags.contains(CellFlags::REVERSE));
    }
}
