// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Appended to every prompt whose answer is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the model inside the mock-interview frame.
pub const ROLE_PLAY_INSTRUCTION: &str = "\
    You are role-playing a professional job interviewer in a practice session. \
    Stay in character for the whole conversation. \
    Never reveal that you are an AI, never break the fourth wall, \
    and never answer the questions on the candidate's behalf.";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid"))
}

/// Replaces every `{key}` placeholder in `template` with its value, in one
/// pass over the template. Substituted text is never expanded again.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
