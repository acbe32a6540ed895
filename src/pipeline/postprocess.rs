//! Post-processing: deterministic cleanup of extracted page text.
//!
//! pdfium returns the text layer as positioned runs flattened into lines.
//! That text is meant for the eye, not the ear: hyphenated line breaks,
//! runs of layout spaces and zero-width characters make a speech engine
//! stumble or spell things out. Each rule below is a pure `&str → String`
//! pass and is tested on its own.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule only sees `\n`;
//! invisible characters go before de-hyphenation so a soft hyphen at a line
//! end does not block the join.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw text of one page.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Re-join words hyphenated across a line break
/// 4. Collapse runs of spaces, tabs and no-break spaces
/// 5. Trim each line
/// 6. Collapse 3+ consecutive newlines down to one blank line
/// 7. Trim the whole page
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = join_hyphenated_breaks(&s);
    let s = collapse_horizontal_space(&s);
    let s = trim_lines(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Concatenate page texts for speech: every non-blank page followed by a
/// blank line.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for page in pages {
        if !page.trim().is_empty() {
            out.push_str(page);
            out.push_str("\n\n");
        }
    }
    out
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Re-join hyphenated line breaks ───────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());

fn join_hyphenated_breaks(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").to_string()
}

// ── Rule 4: Collapse horizontal whitespace ───────────────────────────────────

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]{2,}|[\t\u{00A0}]").unwrap());

fn collapse_horizontal_space(input: &str) -> String {
    RE_HSPACE.replace_all(input, " ").to_string()
}

// ── Rule 5: Trim each line ───────────────────────────────────────────────────

fn trim_lines(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
