//! Pull a JSON object out of free-form model output.
//!
//! Models wrap JSON in markdown fences or prefix it with prose. Tried in
//! order: the whole text, the first fenced block, the outermost `{...}` span.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const FENCE_PATTERN: &str = r"(?s)```(?:json|JSON)?\s*\n?(.*?)```";

/// Compiled once; `None` if the pattern fails to build.
fn fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(FENCE_PATTERN).ok()).as_ref()
}

pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    if let Some(re) = fence() {
        for caps in re.captures_iter(trimmed) {
            if let Some(value) = caps.get(1).and_then(|m| parse_object(m.as_str().trim())) {
                return Some(value);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&trimmed[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
