//! Two-phase render pass over the part registry.
//!
//! Phase one (`Preparing`) asks every dirty part for its geometry against the
//! shared snapshot; no surface mutation happens here. Phase two (`Committing`)
//! applies the collected layouts in the same registration order, so a later
//! part's cells land on top of an earlier part's.
//!
//! Invariants:
//! * The dirty set is sampled once at the start of the pass; a part marking
//!   itself dirty mid-pass is picked up by the next cycle, not this one.
//! * Prepare never runs for a clean part, commit never runs for a part that
//!   did not prepare in this pass.
//! * The first error from either phase aborts the pass; the caller owns
//!   reporting and phase unwinding.

use anyhow::{Context, Result};
use core_view::{PartLayout, PartRegistry, ViewportSnapshot};

use crate::Surface;
use crate::pass_metrics::PassMetrics;
use crate::scheduler::CyclePhase;

/// What one pass did, for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassOutcome {
    /// Parts whose `prepare` ran.
    pub prepared: usize,
    /// Parts whose `commit` ran to completion.
    pub committed: usize,
    /// Names of committed parts in commit order.
    pub committed_order: Vec<&'static str>,
    /// True when the pass was cut short by a part failure.
    pub aborted: bool,
}

impl PassOutcome {
    pub fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

/// One prepare/commit walk bound to a single snapshot.
pub struct RenderPass<'a> {
    snapshot: &'a ViewportSnapshot,
}

impl<'a> RenderPass<'a> {
    pub fn new(snapshot: &'a ViewportSnapshot) -> Self {
        Self { snapshot }
    }

    /// Expects `phase` in `Preparing`; leaves it in `Idle` on success and
    /// wherever the failure happened on error.
    pub fn run(
        &self,
        registry: &mut PartRegistry,
        surface: &mut Surface,
        phase: &mut CyclePhase,
        metrics: &PassMetrics,
    ) -> Result<PassOutcome> {
        let dirty = registry.dirty_indices();
        tracing::trace!(target: "render.pass", dirty = dirty.len(), "pass_started");

        let mut layouts: Vec<(usize, PartLayout)> = Vec::with_capacity(dirty.len());
        let parts = registry.parts_for_pass();

        for &index in &dirty {
            let part = &mut parts[index];
            let layout = part
                .prepare(self.snapshot)
                .with_context(|| format!("prepare failed for part `{}`", part.name()))?;
            metrics.incr_prepared();
            layouts.push((index, layout));
        }
        phase.advance_from(CyclePhase::Preparing);

        let mut outcome = PassOutcome {
            prepared: layouts.len(),
            ..PassOutcome::default()
        };
        for (index, layout) in &layouts {
            let part = &mut parts[*index];
            part.commit(layout, surface)
                .with_context(|| format!("commit failed for part `{}`", part.name()))?;
            metrics.incr_committed();
            outcome.committed += 1;
            outcome.committed_order.push(part.name());
        }
        phase.advance_from(CyclePhase::Committing);

        tracing::trace!(
            target: "render.pass",
            prepared = outcome.prepared,
            committed = outcome.committed,
            "pass_finished"
        );
        Ok(outcome)
    }
}
