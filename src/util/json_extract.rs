//! Best-effort JSON extraction from model output
//!
//! Model responses often wrap JSON in markdown fences or surround it with
//! prose. [`extract_json`] tries progressively looser readings of the text
//! and reports which one worked:
//!
//! 1. the whole trimmed text
//! 2. a ```` ```json ```` fenced block
//! 3. any fenced block
//! 4. the span from the first `{` to the last `}`
//! 5. the first complete JSON object or array embedded in the text

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const FENCE: &str = "```";

/// Which reading of the text produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    Strict,
    FencedJson,
    AnyFence,
    BraceSpan,
    FirstValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no valid JSON found in response ({len} chars)")]
pub struct JsonExtractError {
    pub len: usize,
}

/// Extracts the first JSON value the tiers can find
pub fn extract_json(content: &str) -> Result<(Value, ExtractionTier), JsonExtractError> {
    extract_as::<Value>(content)
}

/// Like [`extract_json`] but deserializes into `T` at every tier, so a
/// tier whose text is valid JSON of the wrong shape does not win.
pub fn extract_as<T: DeserializeOwned>(
    content: &str,
) -> Result<(T, ExtractionTier), JsonExtractError> {
    let trimmed = content.trim();

    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Ok((parsed, ExtractionTier::Strict));
    }

    let candidates = [
        (fenced_block(trimmed, Some("json")), ExtractionTier::FencedJson),
        (fenced_block(trimmed, None), ExtractionTier::AnyFence),
        (brace_span(trimmed), ExtractionTier::BraceSpan),
        (first_json_value(trimmed), ExtractionTier::FirstValue),
    ];

    for (candidate, tier) in candidates {
        if let Some(text) = candidate {
            if let Ok(parsed) = serde_json::from_str::<T>(text) {
                return Ok((parsed, tier));
            }
        }
    }

    Err(JsonExtractError {
        len: content.chars().count(),
    })
}

/// Body of the first fenced block, optionally requiring a language tag
pub fn fenced_block<'a>(content: &'a str, language: Option<&str>) -> Option<&'a str> {
    let mut search = content;

    loop {
        let start = search.find(FENCE)?;
        let after_start = &search[start + FENCE.len()..];
        let line_end = after_start.find('\n')?;
        let tag = after_start[..line_end].trim();
        let body = &after_start[line_end + 1..];

        if let Some(expected) = language {
            if !tag.eq_ignore_ascii_case(expected) {
                // Skip past this block's closing fence.
                let end = body.find(FENCE)?;
                search = &body[end + FENCE.len()..];
                continue;
            }
        }

        let end = body.find(FENCE)?;
        return Some(body[..end].trim());
    }
}

/// Text from the first `{` through the last `}`
pub fn brace_span(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

/// First complete JSON object or array embedded in the text
pub fn first_json_value(content: &str) -> Option<&str> {
    for (idx, ch) in content.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let candidate = &content[idx..];
        let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
        if let Some(Ok(_)) = stream.next() {
            let end = stream.byte_offset();
            if end > 0 && end <= candidate.len() {
                return Some(&candidate[..end]);
            }
        }
    }
    None
}
