//! Status row part: one reverse-video line below the text viewport.
//!
//! Builds `L<line> C<col> | <n> sel | <message>` and paints it at row
//! `snapshot.height()`; the surface is allocated one row taller than the text
//! viewport for exactly this row. When skipping is enabled an unchanged
//! status string produces an empty layout, so a dirty mark that changes
//! nothing visible costs no surface writes.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use core_view::{DirtyFlag, PartLayout, PartSurface, RowLayout, ViewPart, ViewportSnapshot};

use super::lock;

#[derive(Debug, Default)]
struct StatusState {
    line: usize,
    col: usize,
    message: String,
    dirty: DirtyFlag,
    skipped: u64,
}

/// Driver-side handle: updates position or message and marks the row dirty.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    state: Arc<Mutex<StatusState>>,
}

impl StatusHandle {
    pub fn set_position(&self, line: usize, col: usize) {
        let mut state = lock(&self.state);
        state.line = line;
        state.col = col;
        state.dirty.mark();
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let mut state = lock(&self.state);
        state.message = message.into();
        state.dirty.mark();
    }

    /// Passes in which the status row was dirty but visually unchanged.
    pub fn skipped(&self) -> u64 {
        lock(&self.state).skipped
    }
}

pub struct StatusPart {
    state: Arc<Mutex<StatusState>>,
    skip_unchanged: bool,
    last_rendered: Option<String>,
}

impl StatusPart {
    pub fn new(skip_unchanged: bool) -> (Self, StatusHandle) {
        let state = Arc::new(Mutex::new(StatusState::default()));
        let handle = StatusHandle {
            state: state.clone(),
        };
        (
            Self {
                state,
                skip_unchanged,
                last_rendered: None,
            },
            handle,
        )
    }

    fn compose(state: &StatusState, selections: usize) -> String {
        let mut text = format!(
            "L{} C{} | {} sel",
            state.line + 1,
            state.col + 1,
            selections
        );
        if !state.message.is_empty() {
            text.push_str(" | ");
            text.push_str(&state.message);
        }
        text
    }
}

impl ViewPart for StatusPart {
    fn name(&self) -> &'static str {
        "status"
    }

    fn needs_render(&self) -> bool {
        lock(&self.state).dirty.is_set()
    }

    fn force_should_render(&mut self) {
        lock(&self.state).dirty.force();
        self.last_rendered = None;
    }

    fn prepare(&mut self, snapshot: &ViewportSnapshot) -> Result<PartLayout> {
        let mut state = lock(&self.state);
        let text = Self::compose(&state, snapshot.selections().len());
        if self.skip_unchanged && self.last_rendered.as_deref() == Some(text.as_str()) {
            state.skipped += 1;
            tracing::trace!(target: "render.parts", part = "status", "unchanged_skipped");
            return Ok(PartLayout::empty());
        }
        let row = snapshot.height();
        let width = snapshot.width();
        Ok(PartLayout {
            rows: vec![RowLayout {
                row,
                text,
                reverse_spans: vec![(0, width)],
            }],
        })
    }

    fn commit(&mut self, layout: &PartLayout, surface: &mut dyn PartSurface) -> Result<()> {
        for row in &layout.rows {
            surface.clear_row(row.row);
            surface.set_text(row.row, 0, &row.text);
            for &(start, end) in &row.reverse_spans {
                surface.apply_reverse(row.row, start, end);
            }
            self.last_rendered = Some(row.text.clone());
        }
        lock(&self.state).dirty.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellFlags, Surface};

    fn snapshot() -> ViewportSnapshot {
        ViewportSnapshot::new(0, 3, 0, 20, Vec::new())
    }

    #[test]
    fn status_paints_below_viewport_in_reverse() {
        let (mut part, handle) = StatusPart::new(true);
        handle.set_position(4, 9);
        let layout = part.prepare(&snapshot()).unwrap();
        assert_eq!(layout.rows[0].row, 3);
        let mut surface = Surface::new(20, 4);
        part.commit(&layout, &mut surface).unwrap();
        assert_eq!(surface.row_text(3), "L5 C10 | 0 sel");
        assert!(surface.cell(3, 0).unwrap().flags.contains(CellFlags::REVERSE));
        assert!(surface.cell(3, 19).unwrap().flags.contains(CellFlags::REVERSE));
        assert!(!part.needs_render());
    }

    #[test]
    fn message_is_appended() {
        let (mut part, handle) = StatusPart::new(true);
        handle.set_message("saved");
        let layout = part.prepare(&snapshot()).unwrap();
        assert_eq!(layout.rows[0].text, "L1 C1 | 0 sel | saved");
    }

    #[test]
    fn unchanged_status_yields_empty_layout() {
        let (mut part, handle) = StatusPart::new(true);
        handle.set_position(0, 0);
        let snap = snapshot();
        let mut surface = Surface::new(20, 4);
        let first = part.prepare(&snap).unwrap();
        part.commit(&first, &mut surface).unwrap();

        handle.set_position(0, 0);
        assert!(part.needs_render());
        let second = part.prepare(&snap).unwrap();
        assert!(second.is_empty());
        assert_eq!(handle.skipped(), 1);
        // Commit with the empty layout still clears the flag.
        part.commit(&second, &mut surface).unwrap();
        assert!(!part.needs_render());
    }

    #[test]
    fn skip_disabled_always_repaints() {
        let (mut part, handle) = StatusPart::new(false);
        handle.set_position(0, 0);
        let snap = snapshot();
        let mut surface = Surface::new(20, 4);
        let first = part.prepare(&snap).unwrap();
        part.commit(&first, &mut surface).unwrap();

        handle.set_position(0, 0);
        let second = part.prepare(&snap).unwrap();
        assert_eq!(second.rows.len(), 1);
        assert_eq!(handle.skipped(), 0);
    }
}
