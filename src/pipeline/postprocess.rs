//! Post-processing: deterministic cleanup of the assembled Markdown.
//!
//! Text extracted from PDFs carries artefacts of the font encoding rather
//! than of the document: ligature glyphs (`ﬁ` for `fi`), zero-width
//! characters and stray control codes. Block assembly can also leave
//! trailing spaces or stacked blank lines behind. Each rule below is a pure
//! `&str → String` pass and is tested on its own.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so later rules only see `\n`; blank
//! lines are collapsed after whitespace trimming so lines holding only
//! spaces count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to a rendered document.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Expand Latin ligatures (U+FB00 to U+FB06)
/// 3. Strip invisible Unicode and control characters
/// 4. Trim trailing whitespace per line
/// 5. Collapse runs of blank lines to a single blank line
/// 6. End with exactly one newline (an empty document stays empty)
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = expand_ligatures(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Expand ligatures ─────────────────────────────────────────────────

fn expand_ligatures(input: &str) -> String {
    if !input.chars().any(|c| ('\u{FB00}'..='\u{FB06}').contains(&c)) {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            _ => out.push(c),
        }
    }
    out
}

// ── Rule 3: Remove invisible and control characters ─────────────────────────

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    ) || (c.is_control() && c != '\n' && c != '\t')
}

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|&c| !is_invisible(c)).collect()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 6: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_expand_ligatures() {
        assert_eq!(expand_ligatures("e\u{FB03}cient \u{FB01}le \u{FB02}ow"), "efficient file flow");
        assert_eq!(expand_ligatures("plain"), "plain");
    }

    #[test]
    fn test_remove_invisible_chars() {
        assert_eq!(
            remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d\u{0007}e\tf\ng"),
            "abcde\tf\ng"
        );
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hello   \nworld  "), "  hello\nworld");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("text\n\n\n"), "text\n");
        assert_eq!(ensure_final_newline("text"), "text\n");
        assert_eq!(ensure_final_newline("\n\n"), "");
    }

    #[test]
    fn test_full_pipeline() {
        let input = "# Title\r\n\r\nThe \u{FB01}rst   \r\n\r\n\r\n\r\n| a   | b   |\r\n";
        assert_eq!(clean_markdown(input), "# Title\n\nThe first\n\n| a   | b   |\n");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(clean_markdown(""), "");
        assert_eq!(clean_markdown("  \n \n"), "");
    }

    #[test]
    fn test_never_three_newlines() {
        let out = clean_markdown("a\n \n \n \nb\n\t\n\nc");
        assert!(!out.contains("\n\n\n"), "got: {out:?}");
        assert_eq!(out, "a\n\nb\n\nc\n");
    }
}
