//! Output surfaces
//!
//! A surface owns the live region (redrawn in place by the refresher) and
//! permanent output (the summary). [`TerminalSurface`] draws with crossterm;
//! [`MemorySurface`] keeps everything in memory for tests.

use crossterm::{
    cursor::{Hide, MoveToPreviousLine, Show},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::render::{Line, Tone, View};

pub trait Surface: Send {
    /// Replace the live region with `view`
    fn repaint(&mut self, view: &View) -> io::Result<()>;

    /// End the live region, leaving its last frame on screen
    fn settle(&mut self) -> io::Result<()>;

    /// Print lines below the live region
    fn emit(&mut self, view: &View) -> io::Result<()>;
}

/// How wide the terminal is, for counting rows of wrapped lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    /// Ask the terminal on every repaint
    Query,
    Fixed(u16),
    /// Assume nothing wraps
    Unbounded,
}

/// Crossterm-backed surface writing to any `Write` (stdout by default)
pub struct TerminalSurface<W: Write + Send> {
    out: W,
    color: bool,
    width: Width,
    /// Terminal rows covered by the last frame
    live_rows: usize,
    cursor_hidden: bool,
}

impl TerminalSurface<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        let mut surface = Self::new(io::stdout(), color);
        surface.width = Width::Query;
        surface
    }
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            width: Width::Unbounded,
            live_rows: 0,
            cursor_hidden: false,
        }
    }

    /// Wrap lines at `columns` when counting how far to move back up
    pub fn with_width(mut self, columns: u16) -> Self {
        self.width = Width::Fixed(columns);
        self
    }

    fn columns(&self) -> Option<usize> {
        let columns = match self.width {
            Width::Query => terminal::size().ok().map(|(columns, _)| columns),
            Width::Fixed(columns) => Some(columns),
            Width::Unbounded => None,
        };
        columns.filter(|c| *c > 0).map(usize::from)
    }

    /// Rows `view` occupies once long lines wrap.
    ///
    /// Counts chars, so wide glyphs (CJK, emoji) can still undercount.
    fn rows(&self, view: &View) -> usize {
        let Some(columns) = self.columns() else {
            return view.line_count();
        };
        view.lines
            .iter()
            .map(|line| line.text().chars().count().div_ceil(columns).max(1))
            .sum()
    }

    fn write_line(&mut self, line: &Line) -> io::Result<()> {
        for span in &line.spans {
            if !self.color || span.tone == Tone::Plain {
                queue!(self.out, Print(&span.text))?;
                continue;
            }
            let (color, bold) = tone_style(span.tone);
            if let Some(color) = color {
                queue!(self.out, SetForegroundColor(color))?;
            }
            if bold {
                queue!(self.out, SetAttribute(Attribute::Bold))?;
            }
            queue!(
                self.out,
                Print(&span.text),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?;
        }
        queue!(self.out, Print("\n"))
    }
}

impl<W: Write + Send> Surface for TerminalSurface<W> {
    fn repaint(&mut self, view: &View) -> io::Result<()> {
        if !self.cursor_hidden {
            queue!(self.out, Hide)?;
            self.cursor_hidden = true;
        }
        if self.live_rows > 0 {
            let rows = u16::try_from(self.live_rows).unwrap_or(u16::MAX);
            queue!(self.out, MoveToPreviousLine(rows))?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        for line in &view.lines {
            self.write_line(line)?;
        }
        self.live_rows = self.rows(view);
        self.out.flush()
    }

    fn settle(&mut self) -> io::Result<()> {
        self.live_rows = 0;
        if self.cursor_hidden {
            queue!(self.out, Show)?;
            self.cursor_hidden = false;
        }
        self.out.flush()
    }

    fn emit(&mut self, view: &View) -> io::Result<()> {
        if self.live_rows > 0 || self.cursor_hidden {
            self.settle()?;
        }
        for line in &view.lines {
            self.write_line(line)?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Drop for TerminalSurface<W> {
    fn drop(&mut self) {
        if self.cursor_hidden {
            let _ = queue!(self.out, Show);
            let _ = self.out.flush();
        }
    }
}

fn tone_style(tone: Tone) -> (Option<Color>, bool) {
    match tone {
        Tone::Plain => (None, false),
        Tone::Header => (Some(Color::Cyan), true),
        Tone::Success => (Some(Color::Green), false),
        Tone::Failure => (Some(Color::Red), false),
        Tone::Active => (Some(Color::Yellow), false),
        Tone::Queued | Tone::Muted => (Some(Color::DarkGrey), false),
        Tone::Emphasis => (None, true),
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    frames: Vec<String>,
    emitted: Vec<String>,
    settles: usize,
}

/// In-memory surface; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_log<R>(&self, f: impl FnOnce(&mut MemoryLog) -> R) -> R {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut log)
    }

    /// Every repainted frame as plain text
    pub fn frames(&self) -> Vec<String> {
        self.with_log(|log| log.frames.clone())
    }

    pub fn last_frame(&self) -> Option<String> {
        self.with_log(|log| log.frames.last().cloned())
    }

    /// Permanent output as plain text
    pub fn emitted(&self) -> String {
        self.with_log(|log| log.emitted.join("\n"))
    }

    pub fn settle_count(&self) -> usize {
        self.with_log(|log| log.settles)
    }
}

impl Surface for MemorySurface {
    fn repaint(&mut self, view: &View) -> io::Result<()> {
        let text = view.plain_text();
        self.with_log(|log| log.frames.push(text));
        Ok(())
    }

    fn settle(&mut self) -> io::Result<()> {
        self.with_log(|log| log.settles += 1);
        Ok(())
    }

    fn emit(&mut self, view: &View) -> io::Result<()> {
        let lines: Vec<String> = view.lines.iter().map(Line::text).collect();
        self.with_log(|log| log.emitted.extend(lines));
        Ok(())
    }
}
