//! Built-in view parts.
//!
//! Each part comes with a cheaply clonable handle the driving loop keeps after
//! registration; the part itself is boxed into the registry and only reached
//! through the pass. Handles mutate shared state and mark the part dirty in
//! one step, so a state change can never be observed without its dirty mark.
//!
//! Render layering relies on registration order: register text first, the
//! selection overlay second, the status row last.

use std::sync::{Mutex, MutexGuard, PoisonError};

mod selection;
mod status;
mod text_lines;

pub use selection::{SelectionHandle, SelectionOverlayPart};
pub use status::{StatusHandle, StatusPart};
pub use text_lines::{TextHandle, TextLinesPart};

/// Shared-state guard that tolerates poisoning; the guarded values are plain
/// data, valid regardless of where a panicking thread stopped.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
