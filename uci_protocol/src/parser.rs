//! Generic helpers for the engine's free-form text replies.
//!
//! Everything in here is pure string processing and tolerant of malformed
//! input: missing structure yields empty results rather than errors.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// A blank line, optionally holding stray horizontal whitespace.
static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("static pattern"));

/// Split `text` on `delimiter` and trim every resulting field.
pub fn split_trim<'a>(text: &'a str, delimiter: &str) -> Vec<&'a str> {
    text.split(delimiter).map(str::trim).collect()
}

/// Split `text` into lines, trimming each.
pub fn lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

/// Split `text` into top-level blocks separated by blank lines.
pub fn sections(text: &str) -> Vec<&str> {
    BLANK_LINE.split(text).map(str::trim).collect()
}

/// Split `text` at its first blank line into `(head, rest)`.
///
/// If there is no blank line the whole text is the head and the rest is empty.
pub fn split_first_section(text: &str) -> (&str, &str) {
    match BLANK_LINE.find(text) {
        Some(m) => (text[..m.start()].trim(), text[m.end()..].trim()),
        None => (text.trim(), ""),
    }
}

/// Parse `Label: value` lines into a map.
///
/// Each line is split on its first colon; both halves are trimmed. Lines
/// without a colon are ignored and later labels overwrite earlier ones.
pub fn parse_labeled(text: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    for line in lines(text) {
        match line.split_once(':') {
            Some((label, value)) => {
                parsed.insert(label.trim().to_string(), value.trim().to_string());
            }
            None if line.is_empty() => {}
            None => log::debug!("Ignoring unlabeled line: {:?}", line),
        }
    }
    parsed
}

/// Build a completion check that is satisfied once the accumulated text holds
/// a terminated line of the form `<label>: <value>`.
pub fn stops_after_label(label: &str) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    let needle = format!("{}: ", label);
    move |text: &str| {
        text.split_inclusive('\n')
            .filter(|line| line.ends_with('\n'))
            .any(|line| line.trim_start().starts_with(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_trim() {
        assert_eq!(
            split_trim("  Term |  White | Black  ", "|"),
            vec!["Term", "White", "Black"]
        );
        assert_eq!(split_trim("", "|"), vec![""]);
    }

    #[test]
    fn test_sections_splits_on_blank_lines() {
        let text = "first\nblock\n\nsecond\n \nthird\r\n\r\nfourth";
        assert_eq!(
            sections(text),
            vec!["first\nblock", "second", "third", "fourth"]
        );
    }

    #[test]
    fn test_split_first_section() {
        let (head, rest) = split_first_section("grid\nrows\n\nFen: x\n\nKey: y");
        assert_eq!(head, "grid\nrows");
        assert_eq!(rest, "Fen: x\n\nKey: y");

        let (head, rest) = split_first_section("no blank line here\n");
        assert_eq!(head, "no blank line here");
        assert_eq!(rest, "");
    }

    #[test]
    fn test_parse_labeled_uses_first_colon_and_last_value() {
        let parsed = parse_labeled("Fen: 8/8/8 w - - 0 1\nTime: 12:30\nKey: A\nKey: B\nnoise");
        assert_eq!(parsed["Fen"], "8/8/8 w - - 0 1");
        assert_eq!(parsed["Time"], "12:30");
        assert_eq!(parsed["Key"], "B");
        assert!(!parsed.contains_key("noise"));
    }

    #[test]
    fn test_parse_labeled_keeps_empty_values() {
        let parsed = parse_labeled("Checkers: \n");
        assert_eq!(parsed.get("Checkers").map(String::as_str), Some(""));
    }

    #[test]
    fn test_stops_after_label_requires_line_terminator() {
        let done = stops_after_label("Checkers");
        assert!(!done("Key: 1234\n"));
        assert!(!done("Key: 1234\nCheckers: "));
        assert!(done("Key: 1234\nCheckers: \n"));
        assert!(done("Checkers: e1 \r\n"));
    }

    #[test]
    fn test_stops_after_label_across_chunks() {
        let done = stops_after_label("Total evaluation");
        let mut buffer = String::new();
        for chunk in ["Total eval", "uation: 0.1", "3 (white side)", "\n"] {
            assert!(!done(&buffer));
            buffer.push_str(chunk);
        }
        assert!(done(&buffer));
    }
}
