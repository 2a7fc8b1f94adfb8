//! Terminal session handling for the glint viewer.
//!
//! The backend owns raw mode and the alternate screen; everything painted
//! goes through the render surface, so the only terminal state here is the
//! session itself. [`SessionGuard`] restores the host terminal even when the
//! event loop errors out or panics.
//!
//! Reported sizes are clamped to the smallest viewport the part stack can
//! lay out (one text row plus the status row); callers size the surface from
//! the clamped value so a pathological 1-row terminal never produces a
//! zero-height text viewport.

use anyhow::Result;
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
        size,
    },
};
use std::io::stdout;

/// Smallest usable width in columns.
pub const MIN_COLS: u16 = 10;
/// Smallest usable height in rows (one text row plus the status row).
pub const MIN_ROWS: u16 = 2;

/// Clamp a reported terminal size to the smallest layout the viewer supports.
pub fn clamp_size(cols: u16, rows: u16) -> (u16, u16) {
    (cols.max(MIN_COLS), rows.max(MIN_ROWS))
}

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    /// Current terminal size as (columns, rows), already clamped.
    fn size(&self) -> Result<(u16, u16)>;
}

pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if the caller
/// early-returns or panics.
pub struct SessionGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<SessionGuard<'_>> {
        self.enter()?;
        Ok(SessionGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
            self.entered = true;
            tracing::debug!(target: "terminal", "session_entered");
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
            tracing::debug!(target: "terminal", "session_left");
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16)> {
        let (cols, rows) = size()?;
        Ok(clamp_size(cols, rows))
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a> Drop for SessionGuard<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_sizes_clamp_to_minimum_layout() {
        assert_eq!(clamp_size(0, 0), (MIN_COLS, MIN_ROWS));
        assert_eq!(clamp_size(4, 1), (MIN_COLS, MIN_ROWS));
    }

    #[test]
    fn normal_sizes_pass_through() {
        assert_eq!(clamp_size(80, 24), (80, 24));
        assert_eq!(clamp_size(MIN_COLS, MIN_ROWS), (MIN_COLS, MIN_ROWS));
    }
}
