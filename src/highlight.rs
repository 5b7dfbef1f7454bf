//! Syntax highlighting and annotation for fenced code blocks.
//!
//! The fence tag carries the language plus two optional suffixes:
//!
//! - `#start` turns on a line-number sidebar beginning at `start`
//!   (defaulting to 1 when absent or unparsable).
//! - `@line` / `@line,text` attaches a note marker to a 1-based source
//!   line, labelled with an auto-incrementing integer or the given text.
//!
//! Both may appear together, e.g. ```` ```js#5@2@4,see docs ````.
//! Highlighting failures never escape: unknown languages fall back to the
//! escaped raw code with a warning.

use std::collections::BTreeMap;

use autumnus::{HtmlLinkedBuilder, formatter::Formatter, languages::Language};
use tracing::{debug, warn};

/// Highlight a code block according to its fence tag, returning HTML.
///
/// Pure with respect to shared state; warnings go to the tracing channel.
pub fn highlight(code: &str, tag: &str) -> String {
    let fence = parse_tag(tag);
    debug!(
        "highlighting block: language='{}' numbering={:?} notes={}",
        fence.language,
        fence.start_line,
        fence.notes.is_some()
    );

    let body = if fence.language.is_empty() {
        html_escape(code)
    } else {
        highlight_body(code, fence.language)
    };
    let num_lines = count_lines(&body);

    let mut html = String::from("<div class=\"highlight\">");
    if let Some(start) = fence.start_line {
        let numbers = (start..start.saturating_add(num_lines as i64))
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        html.push_str("<div class=\"line-numbers\">");
        html.push_str(&numbers);
        html.push_str("</div>");
    }
    if let Some(notes) = &fence.notes {
        // One entry past the last code line, so a sidebar rule spans the
        // full height of the block.
        let entries = (0..=num_lines)
            .map(|line| match notes.get(line) {
                Some(label) => format!("<span class=\"note\">{}</span>", html_escape(label)),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        html.push_str("<div class=\"notes\">");
        html.push_str(&entries);
        html.push_str("</div>");
    }
    html.push_str(&body);
    html.push_str("</div>");
    html
}

/// A parsed fence tag.
struct FenceTag<'a> {
    /// The language identifier left of any suffix. May be empty.
    language: &'a str,
    /// First sidebar line number, when `#` was present.
    start_line: Option<i64>,
    /// Per-line note labels, when `@` was present. Built fresh per block.
    notes: Option<NoteTable>,
}

/// Sparse mapping from 0-indexed line number to note label.
#[derive(Debug, Default)]
struct NoteTable {
    notes: BTreeMap<usize, String>,
}

impl NoteTable {
    fn insert(&mut self, line: usize, label: String) {
        self.notes.insert(line, label);
    }

    fn get(&self, line: usize) -> Option<&str> {
        self.notes.get(&line).map(String::as_str)
    }
}

fn parse_tag(tag: &str) -> FenceTag<'_> {
    let mut segments = tag.split('@');
    let head = segments.next().unwrap_or_default();
    let notes = tag.contains('@').then(|| parse_notes(segments));

    let (language, start_line) = match head.split_once('#') {
        None => (head, None),
        Some((language, start)) => {
            // Only the segment up to the next '#' is the start number.
            let start = start.split('#').next().unwrap_or_default();
            let start_line = if start.is_empty() {
                1
            } else {
                start.parse().unwrap_or_else(|_| {
                    warn!("unable to parse line number start '{start}', using 1");
                    1
                })
            };
            (language, Some(start_line))
        }
    };

    FenceTag {
        language,
        start_line,
        notes,
    }
}

fn parse_notes<'a>(tokens: impl Iterator<Item = &'a str>) -> NoteTable {
    let mut table = NoteTable::default();
    let mut auto_label = 0u32;
    for token in tokens {
        match token.split_once(',') {
            // Explicit label: does not consume an auto-increment slot.
            Some((line, text)) => {
                if text.is_empty() {
                    warn!("skipping note token '{token}': empty note text");
                    continue;
                }
                match parse_line_number(line) {
                    Some(line) => table.insert(line, text.to_string()),
                    None => warn!("skipping note token '{token}': unparsable line number"),
                }
            }
            // Bare line number: always advances the auto-increment counter.
            None => {
                auto_label += 1;
                match parse_line_number(token) {
                    Some(line) => table.insert(line, auto_label.to_string()),
                    None => warn!("skipping note token '{token}': unparsable line number"),
                }
            }
        }
    }
    table
}

/// Parse a 1-based line number into its 0-based index.
fn parse_line_number(token: &str) -> Option<usize> {
    token.parse::<usize>().ok().filter(|n| *n >= 1).map(|n| n - 1)
}

/// Highlight `code` as `language`, falling back to escaped raw code on any
/// failure. `language` is non-empty.
fn highlight_body(code: &str, language: &str) -> String {
    // Language::guess handles detection from name or extension.
    let lang = Language::guess(language, code);

    if matches!(lang, Language::PlainText)
        && language != "plaintext"
        && language != "text"
    {
        warn!("unrecognized highlight language '{language}', using raw code");
        return html_escape(code);
    }

    let formatter = HtmlLinkedBuilder::new().source(code).lang(lang).build();
    match formatter {
        Ok(f) => {
            let mut output: Vec<u8> = Vec::new();
            if f.format(&mut output).is_ok()
                && let Ok(html) = String::from_utf8(output)
            {
                return html;
            }
            warn!("failed to highlight code as '{language}', using raw code");
            html_escape(code)
        }
        Err(e) => {
            warn!("failed to highlight code as '{language}', using raw code: {e}");
            html_escape(code)
        }
    }
}

/// Count lines the way every line-ending style agrees on: `\r\n`, `\r`,
/// and `\n` each end a line exactly once. The empty string is one line.
fn count_lines(s: &str) -> usize {
    s.split("\r\n")
        .map(|part| part.split(['\r', '\n']).count())
        .sum()
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
