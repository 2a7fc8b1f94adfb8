//! Terminal writer abstraction.
//!
//! A thin command layer between the committed cell surface and the terminal:
//! the pass mutates the [`crate::Surface`], then `emit` walks the grid and
//! translates it into a batched command stream flushed once per frame.
//!
//! Design invariants:
//! * Commands preserve ordering; no flushing mid-frame.
//! * All positions are absolute (0,0) origin; caller ensures bounds.
//! * The writer owns no global state; it is a short-lived object per frame.
//! * Reverse video is emitted as attribute-delimited runs, never per cell.

use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::Write;

use crate::{CellFlags, Surface};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    MoveTo(u16, u16),
    /// Clears the full line; caller guarantees a preceding `MoveTo(0, row)`.
    ClearLine,
    Print(String),
    PrintReverse(String),
}

#[derive(Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }

    pub fn move_to(&mut self, col: u16, row: u16) {
        self.cmds.push(Command::MoveTo(col, row));
    }

    pub fn clear_line(&mut self) {
        self.cmds.push(Command::ClearLine);
    }

    pub fn print<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::Print(s));
        }
    }

    pub fn print_reverse<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::PrintReverse(s));
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }

    pub fn flush(self, out: &mut impl Write) -> Result<()> {
        let count = self.cmds.len();
        for c in self.cmds {
            match c {
                Command::MoveTo(col, row) => {
                    queue!(out, MoveTo(col, row))?;
                }
                Command::ClearLine => {
                    queue!(out, Clear(ClearType::CurrentLine))?;
                }
                Command::Print(s) => {
                    queue!(out, Print(s))?;
                }
                Command::PrintReverse(s) => {
                    queue!(
                        out,
                        SetAttribute(Attribute::Reverse),
                        Print(s),
                        SetAttribute(Attribute::Reset)
                    )?;
                }
            }
        }
        out.flush()?;
        tracing::trace!(target: "render.writer", commands = count, "writer_flushed");
        Ok(())
    }
}

/// Translate the whole surface into writer commands, one row at a time.
///
/// Each row is cleared then repainted as runs of identical flags; trailing
/// unstyled blanks are dropped so short lines cost a clear plus one print.
pub fn emit(surface: &Surface, writer: &mut Writer) {
    for row in 0..surface.height() {
        writer.move_to(0, row);
        writer.clear_line();
        emit_row(surface, row, writer);
    }
}

fn emit_row(surface: &Surface, row: u16, writer: &mut Writer) {
    let mut run = String::new();
    let mut run_flags = CellFlags::empty();
    let width = surface.width();

    let mut end = width;
    while end > 0 {
        match surface.cell(row, end - 1) {
            Some(cell) if cell.ch == ' ' && cell.flags.is_empty() => end -= 1,
            _ => break,
        }
    }

    for col in 0..end {
        let Some(cell) = surface.cell(row, col) else {
            break;
        };
        if cell.flags != run_flags {
            flush_run(writer, &mut run, run_flags);
            run_flags = cell.flags;
        }
        run.push(cell.ch);
    }
    flush_run(writer, &mut run, run_flags);
}

fn flush_run(writer: &mut Writer, run: &mut String, flags: CellFlags) {
    if run.is_empty() {
        return;
    }
    if flags.contains(CellFlags::REVERSE) {
        writer.print_reverse(std::mem::take(run));
    } else {
        writer.print(std::mem::take(run));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_view::PartSurface;

    #[test]
    fn empty_strings_are_not_queued() {
        let mut w = Writer::new();
        w.print("");
        w.print_reverse("");
        assert!(w.commands().is_empty());
    }

    #[test]
    fn plain_row_is_one_print() {
        let mut s = Surface::new(10, 1);
        s.set_text(0, 0, "hello");
        let mut w = Writer::new();
        emit(&s, &mut w);
        assert_eq!(
            w.commands(),
            &[
                Command::MoveTo(0, 0),
                Command::ClearLine,
                Command::Print("hello".into()),
            ]
        );
    }

    #[test]
    fn reverse_span_splits_into_runs() {
        let mut s = Surface::new(10, 1);
        s.set_text(0, 0, "abcdef");
        s.apply_reverse(0, 2, 4);
        let mut w = Writer::new();
        emit(&s, &mut w);
        assert_eq!(
            w.commands(),
            &[
                Command::MoveTo(0, 0),
                Command::ClearLine,
                Command::Print("ab".into()),
                Command::PrintReverse("cd".into()),
                Command::Print("ef".into()),
            ]
        );
    }

    #[test]
    fn reverse_blanks_survive_trailing_trim() {
        let mut s = Surface::new(6, 1);
        s.apply_reverse(0, 0, 3);
        let mut w = Writer::new();
        emit(&s, &mut w);
        assert_eq!(
            w.commands(),
            &[
                Command::MoveTo(0, 0),
                Command::ClearLine,
                Command::PrintReverse("   ".into()),
            ]
        );
    }

    #[test]
    fn blank_row_is_clear_only() {
        let s = Surface::new(8, 2);
        let mut w = Writer::new();
        emit(&s, &mut w);
        assert_eq!(
            w.commands(),
            &[
                Command::MoveTo(0, 0),
                Command::ClearLine,
                Command::MoveTo(0, 1),
                Command::ClearLine,
            ]
        );
    }

    #[test]
    fn flush_writes_to_sink() {
        let mut s = Surface::new(4, 1);
        s.set_text(0, 0, "ok");
        let mut w = Writer::new();
        emit(&s, &mut w);
        let mut sink: Vec<u8> = Vec::new();
        w.flush(&mut sink).unwrap();
        assert!(!sink.is_empty());
    }
}
