//! JSON recovery for answers that are supposed to be JSON but arrive wrapped
//! in prose or markdown fences.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::LlmError;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("fence regex is valid")
    })
}

/// Parses `text` as `T`. When the direct parse fails, tries fenced code
/// blocks and then the outermost brace- or bracket-delimited substring.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyContent);
    }

    let direct_err = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!("Direct JSON parse failed ({direct_err}), trying fallback extraction");

    for candidate in json_candidates(trimmed) {
        if let Ok(value) = serde_json::from_str(candidate) {
            debug!("Recovered JSON from {} byte candidate", candidate.len());
            return Ok(value);
        }
    }

    warn!(
        "No parseable JSON in {} byte answer: {:?}",
        trimmed.len(),
        preview(trimmed)
    );
    Err(LlmError::InvalidJson {
        reason: direct_err.to_string(),
    })
}

/// Candidate substrings in the order they are tried.
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = fence_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();

    let mut delimited: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = text.find(open)?;
            let end = text.rfind(close)?;
            (end > start).then(|| (start, &text[start..=end]))
        })
        .collect();
    delimited.sort_by_key(|(start, _)| *start);
    candidates.extend(delimited.into_iter().map(|(_, s)| s));

    candidates
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
