use std::io::{self, Stdout, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::QueueableCommand;
use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::row_sanitize::sanitize_row_text;

/// Where dashboard rows end up. Implementations serialize their own writes:
/// one call is one uninterrupted sequence on the output.
pub trait RowSink: Send + Sync {
    /// Clear the screen and write `lines` from the top, one per row.
    fn render(&self, lines: &[String]) -> io::Result<()>;

    /// Replace the content of 1-based `row`, leaving the cursor where it was.
    fn update_row(&self, row: u16, text: &str) -> io::Result<()>;
}

/// ANSI terminal sink backed by any writer (stdout in the binary).
pub struct TerminalSink<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Run `f` against the underlying writer while holding the output lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        let out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        f(&out)
    }
}

impl<W: Write + Send> RowSink for TerminalSink<W> {
    fn render(&self, lines: &[String]) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.queue(Clear(ClearType::All))?.queue(MoveTo(0, 0))?;
        for line in lines {
            out.queue(Print(sanitize_row_text(line)))?.queue(Print("\n"))?;
        }
        out.flush()
    }

    fn update_row(&self, row: u16, text: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.queue(SavePosition)?
            .queue(MoveTo(0, row.saturating_sub(1)))?
            .queue(Clear(ClearType::CurrentLine))?
            .queue(Print(sanitize_row_text(text)))?
            .queue(RestorePosition)?;
        out.flush()
    }
}
