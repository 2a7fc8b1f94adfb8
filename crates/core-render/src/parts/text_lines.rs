//! Text rows part: paints the visible slice of a line buffer.
//!
//! Uses a [`RowCache`] so a warm pass repaints only rows whose content
//! actually changed; the cache keys on buffer lines, so vertical scrolling
//! stays warm while width or horizontal-offset changes go cold.
//!
//! Shaping: `first_column` characters are skipped, then characters are taken
//! while their accumulated display width fits the viewport. A wide character
//! that would straddle the right edge is dropped rather than split.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use core_view::{DirtyFlag, PartLayout, PartSurface, RowLayout, ViewPart, ViewportSnapshot};
use unicode_width::UnicodeWidthChar;

use super::lock;
use crate::row_cache::RowCache;

#[derive(Debug, Default)]
struct TextState {
    lines: Vec<String>,
    dirty: DirtyFlag,
    rows_repainted: u64,
    rows_skipped: u64,
}

/// Driver-side handle: mutates the line buffer and marks the part dirty.
#[derive(Debug, Clone)]
pub struct TextHandle {
    state: Arc<Mutex<TextState>>,
}

impl TextHandle {
    pub fn set_lines(&self, lines: Vec<String>) {
        let mut state = lock(&self.state);
        state.lines = lines;
        state.dirty.mark();
    }

    pub fn push_line(&self, line: impl Into<String>) {
        let mut state = lock(&self.state);
        state.lines.push(line.into());
        state.dirty.mark();
    }

    pub fn edit_line(&self, index: usize, line: impl Into<String>) {
        let mut state = lock(&self.state);
        if index < state.lines.len() {
            state.lines[index] = line.into();
            state.dirty.mark();
        }
    }

    pub fn line_count(&self) -> usize {
        lock(&self.state).lines.len()
    }

    /// (repainted, skipped) row counts across all passes so far.
    pub fn row_counters(&self) -> (u64, u64) {
        let state = lock(&self.state);
        (state.rows_repainted, state.rows_skipped)
    }
}

pub struct TextLinesPart {
    state: Arc<Mutex<TextState>>,
    cache: RowCache,
    pass_first_line: usize,
}

impl TextLinesPart {
    pub fn new() -> (Self, TextHandle) {
        let state = Arc::new(Mutex::new(TextState::default()));
        let handle = TextHandle {
            state: state.clone(),
        };
        (
            Self {
                state,
                cache: RowCache::new(),
                pass_first_line: 0,
            },
            handle,
        )
    }

    fn shape(line: &str, first_column: usize, width: u16) -> String {
        let mut out = String::new();
        let mut used: u16 = 0;
        for ch in line.chars().skip(first_column) {
            let w = ch.width().unwrap_or(0) as u16;
            if used + w > width {
                break;
            }
            out.push(ch);
            used += w;
        }
        out
    }
}

impl Default for TextLinesPart {
    fn default() -> Self {
        Self::new().0
    }
}

impl ViewPart for TextLinesPart {
    fn name(&self) -> &'static str {
        "text_lines"
    }

    fn needs_render(&self) -> bool {
        lock(&self.state).dirty.is_set()
    }

    fn force_should_render(&mut self) {
        lock(&self.state).dirty.force();
        self.cache.invalidate();
    }

    fn prepare(&mut self, snapshot: &ViewportSnapshot) -> Result<PartLayout> {
        let mut state = lock(&self.state);
        let warm = self.cache.begin_pass(
            snapshot.first_line(),
            snapshot.first_column(),
            snapshot.width(),
        );
        self.pass_first_line = snapshot.first_line();

        let mut rows = Vec::new();
        for line in snapshot.visible_lines() {
            let Some(row) = snapshot.row_for_line(line) else {
                continue;
            };
            let shaped = state
                .lines
                .get(line)
                .map(|l| Self::shape(l, snapshot.first_column(), snapshot.width()))
                .unwrap_or_default();
            if warm && !self.cache.changed(line, &shaped) {
                state.rows_skipped += 1;
                continue;
            }
            state.rows_repainted += 1;
            rows.push(RowLayout::text(row, shaped));
        }
        tracing::trace!(
            target: "render.parts",
            part = "text_lines",
            rows = rows.len(),
            warm,
            "prepared"
        );
        Ok(PartLayout { rows })
    }

    fn commit(&mut self, layout: &PartLayout, surface: &mut dyn PartSurface) -> Result<()> {
        for row in &layout.rows {
            surface.clear_row(row.row);
            surface.set_text(row.row, 0, &row.text);
            self.cache
                .update(self.pass_first_line + row.row as usize, &row.text);
        }
        lock(&self.state).dirty.clear();
        Ok(())
    }
}
