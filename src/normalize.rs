//! Text normalization for raw extracted text.
//!
//! Paragraphs are text blocks separated by one or more blank lines in the
//! *original* newline structure. Inside a paragraph every whitespace run
//! (single newlines included) collapses to one space; paragraphs are
//! re-joined with exactly one blank line (`"\n\n"`). Non-printable control
//! characters are dropped before collapsing so no double spaces survive.
//!
//! The output is a fixed point: `normalize_text(normalize_text(x)) ==
//! normalize_text(x)`.

use regex::Regex;
use std::sync::OnceLock;

/// Separator placed between paragraphs in normalized text.
pub const PARAGRAPH_BREAK: &str = "\n\n";

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("static paragraph regex"))
}

/// C0/C1 control characters that never carry text. Tab, LF, CR and NEL
/// are whitespace and handled by the collapse step instead.
fn is_stripped_control(c: char) -> bool {
    matches!(
        c,
        '\u{0}'..='\u{8}'
            | '\u{b}'
            | '\u{c}'
            | '\u{e}'..='\u{1f}'
            | '\u{7f}'..='\u{84}'
            | '\u{86}'..='\u{9f}'
    )
}

/// Normalize raw extracted text. Empty or all-whitespace input yields `""`.
pub fn normalize_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = unified.chars().filter(|c| !is_stripped_control(*c)).collect();

    paragraph_break_re()
        .split(&cleaned)
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}

/// Return at most `max_chars` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Short display preview: cut at `max_chars`, back off to the last space
/// when it falls in the final fifth, and mark the cut with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut = truncate_chars(text, max_chars);
    if let Some(space) = cut.rfind(' ') {
        let space_chars = cut[..space].chars().count();
        if space_chars * 5 > max_chars * 4 {
            cut = &cut[..space];
        }
    }
    format!("{}...", cut)
}
