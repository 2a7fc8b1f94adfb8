//! Core event types and channel helpers for glint.
//!
//! Channel policy: the event loop uses a bounded mpsc channel sized by
//! `EVENT_CHANNEL_CAP` for memory safety and natural producer backpressure.
//! The blocking input thread uses `blocking_send`, parking until space frees
//! rather than dropping events; with a single consumer latency stays low and
//! input fidelity is preserved over lossy drop strategies. Telemetry counters
//! record send failures (closed channel) for inspection in tests or periodic
//! logging.

use std::sync::atomic::AtomicU64;
use std::time::Duration;

use core_render::scheduler::FrameSource;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod frame_pump;

pub use frame_pump::FramePump;

pub const EVENT_CHANNEL_CAP: usize = 1024;

pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static CHANNEL_BLOCKING_SENDS: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Input(InputEvent),
    /// A scheduled frame came due; the payload is the frame token handed out
    /// at scheduling time. The consumer forwards it to the scheduler, which
    /// ignores tokens that no longer match its pending frame.
    FrameDue(u64),
    /// Periodic monotonic tick used to drive ephemeral refresh without busy
    /// polling.
    Tick,
    Shutdown,
}

/// Normalized input events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Synthetic interrupt (Ctrl-C) surfaced distinctly from plain keys.
    CtrlC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyEvent {
    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            mods: KeyModifiers::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Esc,
    Up,
    Down,
    Left,
    Right,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
    }
}

/// Trait implemented by any async event producer. Implementors usually hold
/// configuration and spawn one background task that pushes `Event`s into the
/// shared channel.
///
/// Each source owns its task lifecycle: on channel send failure (consumer
/// dropped) it must terminate promptly, and it should avoid busy loops by
/// awaiting timers or external IO futures.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources: stores boxed trait objects and spawns them all
/// at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source
    /// receives its own `Sender` clone; during shutdown the caller drops its
    /// final clone before awaiting the handles so sources observe the closed
    /// channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Take ownership so duplicate spawns are prevented if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Built-in monotonic tick source. Emits `Event::Tick` every configured
/// interval.
pub struct TickEventSource {
    interval: Duration,
}

impl TickEventSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Convenience alias so FrameSource bounds read at the event-loop seam.
pub type PumpHandle = <FramePump as FrameSource>::Handle;

/// Helper result type for channel creation.
pub type EventResult<T> = anyhow::Result<T>;
