//! Terminal styling for tracestats output.
//!
//! Built on the anstyle ecosystem:
//! - anstream strips styles when stdout/stderr isn't a terminal
//! - anstyle for composable styles
//!
//! Messages and data go to stdout; errors go to stderr. Logging (`-v`) goes
//! to stderr through env_logger.

use anstyle::{AnsiColor, Color, Style};
use unicode_width::UnicodeWidthStr;

pub use anstream::{eprint, eprintln, print, println};
pub use anstyle::Style as AnstyleStyle;

pub const SUCCESS_EMOJI: &str = "✅";
pub const ERROR_EMOJI: &str = "❌";
pub const WARNING_EMOJI: &str = "🟡";
pub const HINT_EMOJI: &str = "💡";
pub const INFO_EMOJI: &str = "⚪";

pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
pub const HINT: Style = Style::new().dimmed();
pub const GREEN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
pub const GREEN_BOLD: Style = GREEN.bold();
pub const CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
pub const BOLD: Style = Style::new().bold();
pub const DIM: Style = Style::new().dimmed();

/// `❌ message` in red.
pub fn format_error(msg: &str) -> String {
    format!("{ERROR}{ERROR_EMOJI} {msg}{ERROR:#}")
}

/// `🟡 message` in yellow.
pub fn format_warning(msg: &str) -> String {
    format!("{WARNING}{WARNING_EMOJI} {msg}{WARNING:#}")
}

/// `💡 message`, dimmed.
pub fn format_hint(msg: &str) -> String {
    format!("{HINT_EMOJI} {HINT}{msg}{HINT:#}")
}

/// `✅ message` in green.
pub fn format_success(msg: &str) -> String {
    format!("{GREEN}{SUCCESS_EMOJI} {msg}{GREEN:#}")
}

/// A piece of text with an optional style
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledString {
    pub text: String,
    pub style: Option<Style>,
}

impl StyledString {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style: Some(style),
        }
    }

    /// Visual width; styles are kept out of `text` so nothing needs stripping
    pub fn width(&self) -> usize {
        self.text.width()
    }

    pub fn render(&self) -> String {
        match &self.style {
            Some(style) => format!("{style}{}{style:#}", self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// A column-aligned table. Column widths follow the widest cell, counted in
/// terminal columns so CJK names and emoji line up.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    aligns: Vec<Align>,
    rows: Vec<Vec<StyledString>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = (S, Align)>) -> Self {
        let (headers, aligns) = headers.into_iter().map(|(h, a)| (h.into(), a)).unzip();
        Self {
            headers,
            aligns,
            rows: Vec::new(),
        }
    }

    /// Cells beyond the header count are dropped; missing cells render empty.
    pub fn push(&mut self, mut row: Vec<StyledString>) {
        row.resize_with(self.headers.len(), || StyledString::raw(""));
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .map(|row| row[i].width())
                    .chain(std::iter::once(header.width()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Renders the table with a bold header line. Trailing spaces are trimmed.
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();

        let header: Vec<_> = self
            .headers
            .iter()
            .map(|h| StyledString::styled(h.clone(), BOLD))
            .collect();
        for row in std::iter::once(&header).chain(&self.rows) {
            let mut line = String::new();
            let mut pending = 0;
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    pending += 2;
                }
                let pad = widths[i].saturating_sub(cell.width());
                match self.aligns[i] {
                    Align::Left => {
                        line.push_str(&" ".repeat(pending));
                        line.push_str(&cell.render());
                        pending = pad;
                    }
                    Align::Right => {
                        line.push_str(&" ".repeat(pending + pad));
                        line.push_str(&cell.render());
                        pending = 0;
                    }
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}
