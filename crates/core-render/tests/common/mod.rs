//! Shared test parts for integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use core_view::{PartLayout, PartSurface, ViewPart, ViewportSnapshot};

#[derive(Default)]
struct Shared {
    dirty: AtomicBool,
    prepares: AtomicUsize,
    commits: AtomicUsize,
    fail_commit: AtomicBool,
}

/// Test-side view into a registered [`CountingPart`].
#[derive(Clone)]
pub struct CountingHandle {
    shared: Arc<Shared>,
}

#[allow(dead_code)]
impl CountingHandle {
    pub fn mark(&self) {
        self.shared.dirty.store(true, Ordering::Relaxed);
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Relaxed)
    }

    pub fn prepares(&self) -> usize {
        self.shared.prepares.load(Ordering::Relaxed)
    }

    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::Relaxed)
    }

    pub fn fail_next_commit(&self) {
        self.shared.fail_commit.store(true, Ordering::Relaxed);
    }
}

/// Minimal part that counts its phase calls.
pub struct CountingPart {
    name: &'static str,
    shared: Arc<Shared>,
}

impl CountingPart {
    pub fn new(name: &'static str, dirty: bool) -> (Self, CountingHandle) {
        let shared = Arc::new(Shared::default());
        shared.dirty.store(dirty, Ordering::Relaxed);
        let handle = CountingHandle {
            shared: shared.clone(),
        };
        (Self { name, shared }, handle)
    }
}

impl ViewPart for CountingPart {
    fn name(&self) -> &'static str {
        self.name
    }

    fn needs_render(&self) -> bool {
        self.shared.dirty.load(Ordering::Relaxed)
    }

    fn force_should_render(&mut self) {
        self.shared.dirty.store(true, Ordering::Relaxed);
    }

    fn prepare(&mut self, _snapshot: &ViewportSnapshot) -> Result<PartLayout> {
        self.shared.prepares.fetch_add(1, Ordering::Relaxed);
        Ok(PartLayout::empty())
    }

    fn commit(&mut self, _layout: &PartLayout, _surface: &mut dyn PartSurface) -> Result<()> {
        if self.shared.fail_commit.swap(false, Ordering::Relaxed) {
            return Err(anyhow!("commit refused"));
        }
        self.shared.commits.fetch_add(1, Ordering::Relaxed);
        self.shared.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }
}
