//! Model response parsing
//!
//! Generation endpoints asked for JSON do not always return bare JSON. The
//! parser chain tries, in order:
//! 1. the whole payload as JSON
//! 2. the body of the first fenced code block (```json ... ```)
//! 3. the outermost `{...}` or `[...]` span
//!
//! Each step is a pure function; the first candidate that deserializes into
//! the requested type wins.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Which step of the chain produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStep {
    Direct,
    Fenced,
    Delimited,
}

/// Parse the whole payload
pub fn parse_direct(raw: &str) -> Option<Value> {
    serde_json::from_str(raw.trim()).ok()
}

/// Parse the first fenced code block, with or without a language tag
pub fn parse_fenced(raw: &str) -> Option<Value> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    // Skip the info string ("json", "JSON", ...) up to the end of the line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    serde_json::from_str(body[..end].trim()).ok()
}

/// Parse the span between the first opening and last matching closing delimiter
pub fn parse_delimited(raw: &str) -> Option<Value> {
    let object = span(raw, '{', '}');
    let array = span(raw, '[', ']');

    // Prefer whichever span starts first; fall back to the other
    let mut candidates: Vec<&str> = [object, array].into_iter().flatten().collect();
    candidates.sort_by_key(|s| s.as_ptr() as usize);

    candidates
        .into_iter()
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}

fn span(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Run the chain and deserialize into `T`
///
/// A step whose JSON parses but does not fit `T` does not stop the chain.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Option<(T, ParseStep)> {
    let steps: [(ParseStep, fn(&str) -> Option<Value>); 3] = [
        (ParseStep::Direct, parse_direct),
        (ParseStep::Fenced, parse_fenced),
        (ParseStep::Delimited, parse_delimited),
    ];

    for (step, parser) in steps {
        if let Some(value) = parser(raw) {
            match serde_json::from_value::<T>(value) {
                Ok(parsed) => return Some((parsed, step)),
                Err(e) => {
                    tracing::debug!(step = ?step, error = %e, "Parsed JSON did not match expected shape");
                }
            }
        }
    }

    None
}
