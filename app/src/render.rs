use std::fmt::Write as _;

use snippets_core::{HighlightSpan, HighlightStyle, ResultRow};

const RESET: &str = "\x1b[0m";

fn open_code(style: HighlightStyle) -> &'static str {
    match style {
        HighlightStyle::Light => "\x1b[1;34m",
        HighlightStyle::Dark => "\x1b[1;33m",
    }
}

/// Wrap the characters covered by `spans` in ANSI color codes. With
/// `color` off the text comes back unchanged.
pub fn highlight(
    text: &str,
    spans: &[HighlightSpan],
    style: HighlightStyle,
    color: bool,
) -> String {
    if !color || spans.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + spans.len() * 12);
    let mut spans = spans.iter().peekable();
    let mut inside = false;
    for (idx, ch) in text.chars().enumerate() {
        while let Some(span) = spans.peek() {
            if idx >= span.end {
                if inside {
                    out.push_str(RESET);
                    inside = false;
                }
                spans.next();
            } else {
                break;
            }
        }
        if let Some(span) = spans.peek()
            && idx == span.start
            && !inside
        {
            out.push_str(open_code(style));
            inside = true;
        }
        out.push(ch);
    }
    if inside {
        out.push_str(RESET);
    }
    out
}

/// `folder/name`, followed by the matching content line when there is one.
pub fn render_row(row: &ResultRow, style: HighlightStyle, color: bool) -> String {
    let mut out = highlight(row.snippet.fuzzy_index(), &row.name_spans, style, color);
    if let Some(preview) = &row.preview {
        let _ = write!(
            out,
            "\n    {}: {}",
            preview.line + 1,
            highlight(&preview.text, &preview.spans, style, color)
        );
    }
    out
}

/// Every row. With a cursor, each row gets a marker column and the
/// selected one shows `>`.
pub fn render_list(
    rows: &[ResultRow],
    cursor: Option<usize>,
    style: HighlightStyle,
    color: bool,
) -> String {
    if rows.is_empty() {
        return "No results".to_string();
    }
    rows.iter()
        .enumerate()
        .map(|(idx, row)| match cursor {
            None => render_row(row, style, color),
            Some(selected) => {
                let marker = if idx == selected { '>' } else { ' ' };
                format!("{marker} {}", render_row(row, style, color))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
