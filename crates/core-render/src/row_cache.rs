//! Per-row content hashes letting the text part skip clean rows.
//!
//! The cache keys on absolute buffer line index and stores a fast
//! non-cryptographic hash of the text last committed for that line. A cold
//! cache (first pass, resize, any scroll) repaints everything; a warm cache
//! repaints only rows whose hash changed.
//!
//! Invariants:
//! * `begin_pass` must run before any `changed`/`update` in that pass; it
//!   decides warm vs cold for the whole pass.
//! * A skip is only valid while the surface still displays what the cache
//!   recorded, so any viewport geometry change (first line, first column,
//!   width) goes cold. There is no scroll-shift fast path.

use ahash::AHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

fn hash_line(text: &str) -> u64 {
    let mut hasher = AHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Default)]
pub struct RowCache {
    hashes: HashMap<usize, u64>,
    width: u16,
    first_line: usize,
    first_column: usize,
    primed: bool,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pass; returns true when the cache is warm for this geometry.
    pub fn begin_pass(&mut self, first_line: usize, first_column: usize, width: u16) -> bool {
        if !self.primed
            || self.width != width
            || self.first_line != first_line
            || self.first_column != first_column
        {
            self.hashes.clear();
            self.width = width;
            self.first_line = first_line;
            self.first_column = first_column;
            self.primed = true;
            tracing::trace!(target: "render.row_cache", width, first_line, first_column, "cache_cold");
            return false;
        }
        true
    }

    /// Whether `line` needs repainting given its current text.
    pub fn changed(&self, line: usize, text: &str) -> bool {
        match self.hashes.get(&line) {
            Some(&h) => h != hash_line(text),
            None => true,
        }
    }

    /// Record the text just committed for `line`.
    pub fn update(&mut self, line: usize, text: &str) {
        self.hashes.insert(line, hash_line(text));
    }

    /// Forget one line (its content changed without a commit yet).
    pub fn invalidate_line(&mut self, line: usize) {
        self.hashes.remove(&line);
    }

    /// Forget everything; the next `begin_pass` reports cold.
    pub fn invalidate(&mut self) {
        self.hashes.clear();
        self.primed = false;
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
