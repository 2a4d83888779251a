//! Description markup rendering.
//!
//! Action descriptions are free text with lightweight markup. The action
//! store renders each one through a [`MarkupRenderer`] and attaches the
//! result as display HTML; the raw description is what gets persisted.
//!
//! ```
//! use vineyard_sync::render::{Markdown, MarkupRenderer};
//!
//! let html = Markdown.render("# Veraison\n\nBerries *softening* on row 4");
//! assert_eq!(html, "<h1>Veraison</h1><p>Berries <em>softening</em> on row 4</p>");
//! ```

/// Turns raw description text into display HTML.
pub trait MarkupRenderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// Small Markdown subset: paragraphs, line breaks, `#` headings, `**strong**`,
/// `*em*`, `` `code` `` and `[text](url)` links to http, https or mailto
/// targets. All input is HTML-escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl MarkupRenderer for Markdown {
    fn render(&self, source: &str) -> String {
        let mut out = String::new();
        let mut paragraph: Vec<&str> = Vec::new();

        for line in source.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                flush_paragraph(&mut paragraph, &mut out);
            } else if let Some((level, text)) = heading(line) {
                flush_paragraph(&mut paragraph, &mut out);
                out.push_str(&format!("<h{}>", level));
                inline(&escape(text), &mut out);
                out.push_str(&format!("</h{}>", level));
            } else {
                paragraph.push(line);
            }
        }
        flush_paragraph(&mut paragraph, &mut out);
        out
    }
}

fn flush_paragraph(lines: &mut Vec<&str>, out: &mut String) {
    if lines.is_empty() {
        return;
    }
    out.push_str("<p>");
    for (index, line) in lines.drain(..).enumerate() {
        if index > 0 {
            out.push_str("<br>");
        }
        inline(&escape(line), out);
    }
    out.push_str("</p>");
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let text = line[level..].strip_prefix(' ')?;
    Some((level, text.trim()))
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// Input is already escaped; markers are all ASCII so byte slicing is safe.
fn inline(text: &str, out: &mut String) {
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix('`') {
            if let Some(end) = after.find('`') {
                out.push_str("<code>");
                out.push_str(&after[..end]);
                out.push_str("</code>");
                rest = &after[end + 1..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**").filter(|end| *end > 0) {
                out.push_str("<strong>");
                inline(&after[..end], out);
                out.push_str("</strong>");
                rest = &after[end + 2..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix('*') {
            if let Some(end) = after.find('*').filter(|end| *end > 0) {
                out.push_str("<em>");
                inline(&after[..end], out);
                out.push_str("</em>");
                rest = &after[end + 1..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix('[') {
            if let Some((label, url, remaining)) = link(after) {
                out.push_str(&format!("<a href=\"{}\">", url));
                inline(label, out);
                out.push_str("</a>");
                rest = remaining;
                continue;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
}

/// Schemes a rendered link may point at. Anything else stays literal text.
const LINK_SCHEMES: [&str; 3] = ["http://", "https://", "mailto:"];

fn link(after_bracket: &str) -> Option<(&str, &str, &str)> {
    let label_end = after_bracket.find("](")?;
    let label = &after_bracket[..label_end];
    let tail = &after_bracket[label_end + 2..];

    let mut depth = 0usize;
    let mut url_end = None;
    for (index, c) in tail.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                url_end = Some(index);
                break;
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    let url_end = url_end?;
    let url = &tail[..url_end];

    if label.is_empty() || url.is_empty() || url.contains(char::is_whitespace) {
        return None;
    }
    let lowered = url.to_ascii_lowercase();
    if !LINK_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }
    Some((label, url, &tail[url_end + 1..]))
}
