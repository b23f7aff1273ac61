//! Splits a raw completion into titled patterns. Total: every input yields a
//! (possibly empty) list, never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::pipeline::composer::approach_label;

static DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)---\s*(?:パターン|PATTERN)\s*\d+\s*---").expect("Valid delimiter regex"));

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:タイトル|Title)\s*[:：]\s*(.+)$").expect("Valid title regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub approach: String,
    pub title: String,
    pub content: String,
}

/// Trimmed, non-blank fragments between delimiters. Input without any
/// delimiter is one fragment.
pub fn split_fragments(raw: &str) -> Vec<String> {
    let fragments: Vec<String> = DELIMITER
        .split(raw)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    if fragments.is_empty() && !raw.trim().is_empty() {
        return vec![raw.trim().to_string()];
    }
    fragments
}

pub fn parse(raw: &str, expected: usize) -> Vec<Pattern> {
    let patterns: Vec<Pattern> = split_fragments(raw)
        .iter()
        .enumerate()
        .map(|(i, fragment)| parse_fragment(i, fragment))
        .collect();
    if patterns.len() != expected {
        warn!(expected, found = patterns.len(), "pattern count differs from request");
    }
    patterns
}

fn parse_fragment(index: usize, fragment: &str) -> Pattern {
    let lines: Vec<&str> = fragment.lines().collect();
    let title_at = lines.iter().position(|l| TITLE_LINE.is_match(l));

    let (title, content) = match title_at.and_then(|i| TITLE_LINE.captures(lines[i]).map(|c| (i, c))) {
        Some((i, caps)) => {
            let title = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let body: Vec<&str> = lines
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, l)| *l)
                .collect();
            (title, body.join("\n").trim().to_string())
        }
        None => (format!("Pattern {}", index + 1), lines.join("\n")),
    };

    Pattern { approach: approach_label(index).to_string(), title, content }
}
