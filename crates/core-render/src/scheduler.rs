//! Coalescing render scheduler and per-frame cycle state machine.
//!
//! Producers call `request_render` whenever state changes; the first request
//! schedules a deferred frame with the frame source and every further request
//! before that frame fires coalesces into it (one pending frame per scheduler
//! instance, never a queue). `on_frame` validates the delivered token against
//! the pending handle so a frame that was cancelled or superseded is counted
//! and dropped instead of triggering a spurious pass.
//!
//! Cycle contract:
//! - Phases advance strictly `Idle -> PendingFlush -> Snapshotting ->
//!   Preparing -> Committing -> Idle`; no transition is skipped, including on
//!   the abort path, which walks the remaining phases back to `Idle`.
//! - The viewport snapshot is taken exactly once per pass, during
//!   `Snapshotting`, and shared immutably with every part.
//! - A failed pass reports its error exactly once through the [`ErrorSink`]
//!   and leaves the scheduler in `Idle`, ready for the next request.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use core_view::{PartRegistry, ViewportSnapshot};

use crate::Surface;
use crate::pass::{PassOutcome, RenderPass};
use crate::pass_metrics::PassMetrics;
use crate::timing::RenderTiming;

/// Deferred frame provider the scheduler asks for wakeups.
///
/// Implementations: the async pump in the event crate (timer-backed) and
/// [`ManualFrameSource`] for deterministic tests.
pub trait FrameSource {
    /// Token identifying one scheduled frame. Compared against the token
    /// delivered to `on_frame` to reject stale wakeups.
    type Handle: Copy + PartialEq + Debug;

    /// Request a wakeup no later than `max_deferral` from now.
    fn schedule(&mut self, max_deferral: Duration) -> Self::Handle;

    /// Best-effort cancellation of a previously scheduled frame. A source may
    /// still deliver the token afterwards; `on_frame` rejects it by equality.
    fn cancel(&mut self, handle: Self::Handle);
}

/// Synchronous frame source for tests: hands out sequential tokens and lets
/// the test decide when (and with which token) to fire.
#[derive(Debug, Default)]
pub struct ManualFrameSource {
    next: u64,
    scheduled: u64,
    cancelled: u64,
}

impl ManualFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Token the next `schedule` call will return.
    pub fn peek_next(&self) -> u64 {
        self.next
    }
}

impl FrameSource for ManualFrameSource {
    type Handle = u64;

    fn schedule(&mut self, _max_deferral: Duration) -> u64 {
        let handle = self.next;
        self.next += 1;
        self.scheduled += 1;
        handle
    }

    fn cancel(&mut self, _handle: u64) {
        self.cancelled += 1;
    }
}

/// Receiver for pass failures. Reported exactly once per failed pass.
pub trait ErrorSink {
    fn report(&mut self, error: &anyhow::Error);
}

/// Default sink: structured error event on the render target.
#[derive(Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&mut self, error: &anyhow::Error) {
        tracing::error!(target: "render.errors", error = %error, "pass_failed");
    }
}

/// Test sink capturing reported error strings.
#[derive(Debug, Default)]
pub struct CollectingErrorSink {
    pub reports: Vec<String>,
}

impl ErrorSink for CollectingErrorSink {
    fn report(&mut self, error: &anyhow::Error) {
        self.reports.push(format!("{error:#}"));
    }
}

/// Where the scheduler obtains the per-pass viewport capture.
pub trait SnapshotSource {
    fn capture(&mut self) -> ViewportSnapshot;
}

impl<F> SnapshotSource for F
where
    F: FnMut() -> ViewportSnapshot,
{
    fn capture(&mut self) -> ViewportSnapshot {
        self()
    }
}

/// Phases of one render cycle.
///
/// `next` is total: `Committing` wraps to `Idle`. `advance_from` asserts the
/// expected predecessor in debug builds so an out-of-order call site is caught
/// in tests rather than silently re-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    PendingFlush,
    Snapshotting,
    Preparing,
    Committing,
}

impl CyclePhase {
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::PendingFlush,
            Self::PendingFlush => Self::Snapshotting,
            Self::Snapshotting => Self::Preparing,
            Self::Preparing => Self::Committing,
            Self::Committing => Self::Idle,
        }
    }

    pub fn advance_from(&mut self, expected: Self) {
        debug_assert_eq!(*self, expected, "cycle phase advanced out of order");
        *self = expected.next();
        tracing::trace!(target: "render.cycle", phase = ?*self, "phase_advanced");
    }
}

/// Semantic scheduling counters, separate from execution-path metrics.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    frames_requested: AtomicU64,
    frames_coalesced: AtomicU64,
    frames_fired: AtomicU64,
    stale_tokens: AtomicU64,
    forced_flushes: AtomicU64,
    passes_completed: AtomicU64,
    passes_aborted: AtomicU64,
    errors_reported: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerMetricsSnapshot {
    pub frames_requested: u64,
    pub frames_coalesced: u64,
    pub frames_fired: u64,
    pub stale_tokens: u64,
    pub forced_flushes: u64,
    pub passes_completed: u64,
    pub passes_aborted: u64,
    pub errors_reported: u64,
}

impl SchedulerMetrics {
    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            frames_requested: self.frames_requested.load(Ordering::Relaxed),
            frames_coalesced: self.frames_coalesced.load(Ordering::Relaxed),
            frames_fired: self.frames_fired.load(Ordering::Relaxed),
            stale_tokens: self.stale_tokens.load(Ordering::Relaxed),
            forced_flushes: self.forced_flushes.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_aborted: self.passes_aborted.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Coalescing scheduler: owns the single pending frame, the cycle phase, the
/// error sink, and both metric families.
pub struct RenderScheduler<S: FrameSource> {
    source: S,
    pending: Option<S::Handle>,
    phase: CyclePhase,
    max_deferral: Duration,
    sink: Box<dyn ErrorSink>,
    metrics: SchedulerMetrics,
    pass_metrics: PassMetrics,
    timing: RenderTiming,
}

impl<S: FrameSource> RenderScheduler<S> {
    pub fn new(source: S, max_deferral: Duration) -> Self {
        Self::with_sink(source, max_deferral, Box::new(TracingErrorSink))
    }

    pub fn with_sink(source: S, max_deferral: Duration, sink: Box<dyn ErrorSink>) -> Self {
        Self {
            source,
            pending: None,
            phase: CyclePhase::Idle,
            max_deferral,
            sink,
            metrics: SchedulerMetrics::default(),
            pass_metrics: PassMetrics::default(),
            timing: RenderTiming::default(),
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    pub fn pass_metrics(&self) -> &PassMetrics {
        &self.pass_metrics
    }

    pub fn timing(&self) -> &RenderTiming {
        &self.timing
    }

    pub fn frame_source(&self) -> &S {
        &self.source
    }

    /// Record that presentation state is stale. The first call while idle
    /// schedules a frame and enters `PendingFlush`; later calls before the
    /// frame fires coalesce into the already pending one.
    pub fn request_render(&mut self) {
        SchedulerMetrics::incr(&self.metrics.frames_requested);
        if self.pending.is_some() {
            SchedulerMetrics::incr(&self.metrics.frames_coalesced);
            tracing::trace!(target: "render.scheduler", "request_coalesced");
            return;
        }
        let handle = self.source.schedule(self.max_deferral);
        tracing::debug!(target: "render.scheduler", handle = ?handle, "frame_scheduled");
        self.pending = Some(handle);
        self.phase.advance_from(CyclePhase::Idle);
    }

    /// Frame-source wakeup. Runs one pass when `token` matches the pending
    /// handle; stale or unexpected tokens are counted and ignored.
    pub fn on_frame(
        &mut self,
        token: S::Handle,
        snapshot_source: &mut dyn SnapshotSource,
        registry: &mut PartRegistry,
        surface: &mut Surface,
    ) -> Option<PassOutcome> {
        match self.pending {
            Some(pending) if pending == token => {}
            _ => {
                SchedulerMetrics::incr(&self.metrics.stale_tokens);
                tracing::debug!(target: "render.scheduler", token = ?token, "stale_frame_ignored");
                return None;
            }
        }
        self.pending = None;
        SchedulerMetrics::incr(&self.metrics.frames_fired);
        Some(self.flush_internal(snapshot_source, registry, surface))
    }

    /// Immediate flush (resize, shutdown paint). Cancels any pending frame
    /// and runs a pass right now, entering the cycle from wherever it stands.
    pub fn flush_now(
        &mut self,
        snapshot_source: &mut dyn SnapshotSource,
        registry: &mut PartRegistry,
        surface: &mut Surface,
    ) -> PassOutcome {
        SchedulerMetrics::incr(&self.metrics.forced_flushes);
        if let Some(handle) = self.pending.take() {
            self.source.cancel(handle);
        }
        if self.phase == CyclePhase::Idle {
            self.phase.advance_from(CyclePhase::Idle);
        }
        self.flush_internal(snapshot_source, registry, surface)
    }

    /// Drop the pending frame without rendering (teardown path).
    pub fn detach(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.source.cancel(handle);
            tracing::debug!(target: "render.scheduler", "pending_frame_detached");
        }
        self.phase = CyclePhase::Idle;
    }

    fn flush_internal(
        &mut self,
        snapshot_source: &mut dyn SnapshotSource,
        registry: &mut PartRegistry,
        surface: &mut Surface,
    ) -> PassOutcome {
        let started = std::time::Instant::now();
        self.phase.advance_from(CyclePhase::PendingFlush);
        let snapshot = snapshot_source.capture();
        self.phase.advance_from(CyclePhase::Snapshotting);

        let result = RenderPass::new(&snapshot).run(
            registry,
            surface,
            &mut self.phase,
            &self.pass_metrics,
        );
        self.timing.record_last_pass_ns(started.elapsed().as_nanos() as u64);

        match result {
            Ok(outcome) => {
                SchedulerMetrics::incr(&self.metrics.passes_completed);
                tracing::debug!(
                    target: "render.scheduler",
                    prepared = outcome.prepared,
                    committed = outcome.committed,
                    "pass_completed"
                );
                outcome
            }
            Err(error) => {
                self.abort_to_idle();
                SchedulerMetrics::incr(&self.metrics.passes_aborted);
                SchedulerMetrics::incr(&self.metrics.errors_reported);
                self.sink.report(&error);
                PassOutcome::aborted()
            }
        }
    }

    /// Walk the remaining phase transitions back to `Idle` after an abort.
    /// Dirty flags of unfinished parts stay set, so the next cycle retries.
    fn abort_to_idle(&mut self) {
        while self.phase != CyclePhase::Idle {
            let current = self.phase;
            self.phase.advance_from(current);
        }
        tracing::debug!(target: "render.cycle", "pass_aborted");
    }
}

impl<S: FrameSource + Debug> Debug for RenderScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("source", &self.source)
            .field("pending", &self.pending.map(|h| format!("{h:?}")))
            .field("phase", &self.phase)
            .field("max_deferral", &self.max_deferral)
            .finish()
    }
}

/// Run one pass outside any scheduler (startup paint, tests).
///
/// Enters the cycle from `Idle` and walks the same transitions a scheduled
/// frame would.
pub fn run_detached_pass(
    snapshot: &ViewportSnapshot,
    registry: &mut PartRegistry,
    surface: &mut Surface,
    metrics: &PassMetrics,
) -> Result<PassOutcome> {
    let mut phase = CyclePhase::Idle;
    phase.advance_from(CyclePhase::Idle);
    phase.advance_from(CyclePhase::PendingFlush);
    phase.advance_from(CyclePhase::Snapshotting);
    RenderPass::new(snapshot).run(registry, surface, &mut phase, metrics)
}
