//! Console output for the `music-graph` binary.

use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn get_styles() -> Styles {
    let ansi = |color: AnsiColor| Some(Color::Ansi(color));
    let heading = Style::new().bold().underline().fg_color(ansi(AnsiColor::Cyan));
    let good = Style::new().bold().fg_color(ansi(AnsiColor::Green));
    let bad = Style::new().bold().fg_color(ansi(AnsiColor::Red));

    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(good)
        .valid(good)
        .invalid(bad)
        .error(bad)
        .placeholder(Style::new().fg_color(ansi(AnsiColor::BrightBlack)))
}

/// Colours by role rather than by hue.
pub mod palette {
    use crossterm::style::Color;

    pub const FRAME: Color = Color::Rgb { r: 0, g: 255, b: 255 };
    pub const LABEL: Color = Color::Rgb { r: 180, g: 100, b: 255 };
    pub const OK: Color = Color::Rgb { r: 0, g: 255, b: 136 };
    pub const WARN: Color = Color::Rgb { r: 255, g: 165, b: 0 };
    pub const ERR: Color = Color::Rgb { r: 255, g: 85, b: 85 };
    pub const INFO: Color = Color::Rgb { r: 100, g: 149, b: 237 };
    pub const MUTED: Color = Color::Rgb { r: 128, g: 128, b: 128 };
    pub const TEXT: Color = Color::Rgb { r: 255, g: 255, b: 255 };
}

use palette::*;

const RULE: &str = "─";
const SECTION_WIDTH: usize = 60;

/// Widest a table cell is allowed to get before it is cut with an ellipsis.
const MAX_CELL_WIDTH: usize = 40;

// Status lines

fn print_status(icon: &str, color: crossterm::style::Color, message: &str) {
    println!(" {} {}", icon.with(color).bold(), message.with(color));
}

pub fn print_success(message: &str) {
    print_status("✓", OK, message);
}

pub fn print_error(message: &str) {
    print_status("✗", ERR, message);
}

pub fn print_warning(message: &str) {
    print_status("⚠", WARN, message);
}

pub fn print_info(message: &str) {
    print_status("ℹ", INFO, message);
}

// Sections

/// `╭──── Title ────╮`, centred on [`SECTION_WIDTH`].
pub fn print_section_header(title: &str) {
    let free = SECTION_WIDTH.saturating_sub(title.width() + 2);
    let left = free / 2;
    println!();
    println!(
        "{}{} {} {}{}",
        "╭".with(FRAME),
        RULE.repeat(left).with(FRAME),
        title.with(FRAME).bold().attribute(Attribute::Italic),
        RULE.repeat(free - left).with(FRAME),
        "╮".with(FRAME)
    );
}

pub fn print_section_footer() {
    println!(
        "{}{}{}",
        "╰".with(FRAME),
        RULE.repeat(SECTION_WIDTH).with(FRAME),
        "╯".with(FRAME)
    );
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        "●".with(LABEL),
        format!("{}:", key).with(MUTED),
        value.with(TEXT)
    );
}

/// Same as [`print_key_value`] but for the headline numbers of a report.
pub fn print_key_value_highlight(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        "◆".with(LABEL),
        format!("{}:", key).with(FRAME).bold(),
        value.with(OK).bold()
    );
}

pub fn print_list_item(item: &str, indent: usize) {
    println!("{}{}  {}", "  ".repeat(indent), "▶".with(FRAME), item.with(TEXT));
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        "○".with(MUTED),
        message.with(MUTED).attribute(Attribute::Italic)
    );
}

// Tables

/// Cuts `text` to at most `max_width` display columns, ending in `…` when cut.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn is_numeric(cell: &str) -> bool {
    !cell.is_empty() && cell.parse::<f64>().is_ok()
}

/// Pads `cell` to `width` columns. Numbers are right aligned.
fn pad(cell: &str, width: usize) -> String {
    let fill = " ".repeat(width.saturating_sub(cell.width()));
    if is_numeric(cell) {
        format!("{}{}", fill, cell)
    } else {
        format!("{}{}", cell, fill)
    }
}

/// Column-aligned table with a header rule and no outer frame.
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<&str>) -> Self {
        TableBuilder {
            widths: headers.iter().map(|h| h.width()).collect(),
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }

    /// Adds a row. Cells past the header count are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        let row: Vec<String> = row
            .iter()
            .take(self.headers.len())
            .map(|cell| truncate_to_width(cell, MAX_CELL_WIDTH))
            .collect();
        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn print(&self) {
        if self.headers.is_empty() {
            return;
        }
        let separator = format!(" {} ", "│".with(MUTED));

        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&self.widths)
            .map(|(h, w)| format!("{}", pad(h, *w).with(FRAME).bold()))
            .collect();
        println!("  {}", header.join(&separator));

        let rule: Vec<String> = self.widths.iter().map(|w| RULE.repeat(*w)).collect();
        println!("  {}", rule.join("─┼─").with(MUTED));

        for row in &self.rows {
            let cells: Vec<String> = self
                .widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    format!("{}", pad(cell, *w).with(TEXT))
                })
                .collect();
            println!("  {}", cells.join(&separator));
        }
    }
}

pub fn get_prompt(label: &str) -> String {
    format!("{} {} ", label.with(LABEL).bold(), "❯".with(FRAME).bold())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate_to_width("Creep", 10), "Creep");
    }

    #[test]
    fn test_truncate_cuts_long_text_with_ellipsis() {
        let cut = truncate_to_width("Bohemian Rhapsody", 8);
        assert_eq!(cut, "Bohemia…");
        assert_eq!(cut.width(), 8);
    }

    #[test]
    fn test_truncate_counts_wide_characters() {
        // each CJK character takes two columns
        let cut = truncate_to_width("東京事変の歌", 7);
        assert_eq!(cut, "東京事…");
        assert!(cut.width() <= 7);
    }

    #[test]
    fn test_pad_right_aligns_numbers() {
        assert_eq!(pad("42", 5), "   42");
        assert_eq!(pad("0.75", 6), "  0.75");
        assert_eq!(pad("pop", 5), "pop  ");
        assert_eq!(pad("", 2), "  ");
    }

    #[test]
    fn test_table_widths_follow_widest_cell() {
        let mut table = TableBuilder::new(vec!["Genre", "Tracks"]);
        table.add_row(vec!["progressive-house".to_string(), "7".to_string()]);
        table.add_row(vec!["pop".to_string(), "1200".to_string(), "extra".to_string()]);

        assert_eq!(table.widths, vec![17, 6]);
        assert_eq!(table.rows[1].len(), 2);
        assert!(!table.is_empty());
    }
}
