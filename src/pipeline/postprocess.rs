//! Post-processing: deterministic cleanup of model output.
//!
//! ## Why is post-processing necessary?
//!
//! Even when told to answer with bare JSON or plain text, models sometimes
//! wrap the answer in ```` ```json ```` fences, emit CRLF line endings, or
//! prepend a BOM. None of that changes the meaning, but any of it breaks
//! `serde_json::from_str`. Fixing the quirks here keeps the prompts focused
//! on what to produce.
//!
//! Two entry points, one per call:
//!
//! * [`clean_feedback`] runs before the orchestrator parses feedback JSON.
//! * [`clean_ocr_text`] tidies the transcription that becomes prompt input.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean raw feedback content so it can be parsed as JSON.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (BOM, zero-width spaces)
/// 2. Strip outer code fences (```` ```json ```` or bare ```` ``` ````)
/// 3. Trim surrounding whitespace
pub fn clean_feedback(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = strip_code_fences(&s);
    s.trim().to_string()
}

/// Clean OCR output.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode
/// 6. Trim surrounding whitespace
pub fn clean_ocr_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule: Strip outer code fences ────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse blank lines ───────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

// ── Rule: Strip invisible Unicode ────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{00AD}'
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences() {
        let input = "```json\n{\"score\": 80}\n```";
        assert_eq!(clean_feedback(input), "{\"score\": 80}");
    }

    #[test]
    fn test_strip_bare_fences() {
        let input = "  ```\n{\"a\": 1}\n```  \n";
        assert_eq!(clean_feedback(input), "{\"a\": 1}");
    }

    #[test]
    fn test_plain_json_passthrough() {
        assert_eq!(clean_feedback(" {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_bom_removed_before_fence_detection() {
        let input = "\u{FEFF}```json\r\n{\"a\":1}\r\n```";
        assert_eq!(clean_feedback(input), "{\"a\":1}");
    }

    #[test]
    fn test_inner_fences_kept() {
        let input = "{\"tip\": \"use ``` sparingly\"}";
        assert_eq!(clean_feedback(input), input);
    }

    #[test]
    fn test_ocr_cleanup() {
        let input = "Jane Doe   \r\nEngineer\r\n\r\n\r\n\r\n\r\n- Rust\u{200B}\n";
        assert_eq!(clean_ocr_text(input), "Jane Doe\nEngineer\n\n\n- Rust");
    }

    #[test]
    fn test_ocr_whitespace_only_is_empty() {
        assert_eq!(clean_ocr_text(" \n\t\n "), "");
    }
}
