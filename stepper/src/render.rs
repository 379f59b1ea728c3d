//! Board rendering
//!
//! Turns a registry [`Snapshot`] into styled lines. Nothing here touches
//! shared state; the refresher and the summary both render from snapshots.

use std::fmt;

use crate::registry::{Snapshot, TaskDescriptor};

pub const CHECK: &str = "✓";
pub const CROSS: &str = "✗";
pub const QUEUED: &str = "-";

/// Style hint attached to a span of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Header,
    Success,
    Failure,
    Active,
    Queued,
    Muted,
    Emphasis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub tone: Tone,
}

impl Span {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Plain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Multi-line styled text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub lines: Vec<Line>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }

    pub fn extend(&mut self, other: View) {
        self.lines.extend(other.lines);
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Text without style hints, one line per row
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plain_text())
    }
}

/// Render every phase in first-seen order with one status line per task
pub fn render_board(snapshot: &Snapshot, frame: usize, spinner: &[String]) -> View {
    let mut view = View::new();

    for phase in snapshot.phases.iter().filter(|p| !p.tasks.is_empty()) {
        view.push(phase_header(&phase.name));
        for task in &phase.tasks {
            let is_current = snapshot.current == Some(task.id);
            view.push(task_line(task, is_current, frame, spinner));
        }
        view.push(Line::blank());
    }

    view
}

pub fn phase_header(name: &str) -> Line {
    Line::new(vec![Span::new(name.to_uppercase(), Tone::Header)])
}

/// Status line for one task
pub fn task_line(task: &TaskDescriptor, is_current: bool, frame: usize, spinner: &[String]) -> Line {
    if task.is_completed() {
        if task.succeeded() {
            return Line::new(vec![
                Span::new(format!("  {} ", CHECK), Tone::Success),
                Span::plain(task.name.clone()),
            ]);
        }

        let mut spans = vec![
            Span::new(format!("  {} ", CROSS), Tone::Failure),
            Span::plain(task.name.clone()),
        ];
        if !task.message.is_empty() {
            spans.push(Span::new(format!(": {}", task.message), Tone::Failure));
        }
        return Line::new(spans);
    }

    if is_current {
        return Line::new(vec![
            Span::new(format!("  {} ", spinner_glyph(spinner, frame)), Tone::Active),
            Span::new(task.name.clone(), Tone::Active),
        ]);
    }

    Line::new(vec![
        Span::new(format!("  {} ", QUEUED), Tone::Queued),
        Span::new(task.name.clone(), Tone::Queued),
    ])
}

pub fn spinner_glyph(spinner: &[String], frame: usize) -> &str {
    if spinner.is_empty() {
        return "*";
    }
    &spinner[frame % spinner.len()]
}
