//! Admission checks and first-line classification. Nothing in here does I/O.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotText,
    TooLarge,
}

impl SkipReason {
    pub fn message(self, key: &str) -> String {
        match self {
            SkipReason::NotText => format!("Skipped file {key} (not a text file)"),
            SkipReason::TooLarge => format!("Skipped file {key} (too large)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Skip(SkipReason),
}

/// Decides from object metadata alone whether the body is worth reading.
/// The type check runs first; an object that fails both only reports `NotText`.
pub fn admit(key: &str, content_type: &str, content_length: i64, max_bytes: i64) -> Admission {
    if !content_type.starts_with("text/") && !key.ends_with(".txt") {
        Admission::Skip(SkipReason::NotText)
    } else if content_length > max_bytes {
        Admission::Skip(SkipReason::TooLarge)
    } else {
        Admission::Admit
    }
}

/// Unicode `White_Space` plus the ASCII file/group/record/unit separators.
fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

fn trim_separators(text: &str) -> &str {
    text.trim_matches(is_separator)
}

fn word_count(line: &str) -> usize {
    line.split(is_separator).filter(|word| !word.is_empty()).count()
}

/// The text chosen for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedLine<'a> {
    pub line: &'a str,
    /// Lines after the first were dropped.
    pub truncated: bool,
}

/// Picks the text to classify. Content with at most one newline is taken
/// whole; otherwise only the first line is kept.
pub fn select_line(content: &str) -> SelectedLine<'_> {
    if content.matches('\n').count() <= 1 {
        SelectedLine {
            line: trim_separators(content),
            truncated: false,
        }
    } else {
        SelectedLine {
            line: trim_separators(content.split('\n').next().unwrap_or_default()),
            truncated: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub data: Value,
    pub word_count: Option<usize>,
    pub char_count: usize,
}

pub fn classify_line(line: &str) -> ProcessedContent {
    let char_count = line.chars().count();
    match serde_json::from_str::<Value>(line) {
        Ok(data) => ProcessedContent {
            kind: ContentKind::Json,
            data,
            word_count: None,
            char_count,
        },
        Err(_) => ProcessedContent {
            kind: ContentKind::Text,
            data: Value::String(line.to_owned()),
            word_count: Some(word_count(line)),
            char_count,
        },
    }
}
