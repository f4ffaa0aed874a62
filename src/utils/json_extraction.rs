//! JSON extraction for LLM responses.
//!
//! Models asked for JSON frequently wrap it in markdown fences or prefix it
//! with prose. Extraction tries, in order:
//! 1. A fenced ```json block
//! 2. A generic ``` block
//! 3. The whole trimmed content
//! 4. The first balanced `{...}` or `[...]` span that parses
//!
//! Content that opens an object but never closes it is reported as
//! truncated so callers can log the distinction.
//!
//! ```
//! use lessonforge::utils::json_extraction::try_extract_json;
//!
//! let json = try_extract_json("Sure! {\"status\": \"ok\"}").unwrap();
//! assert_eq!(json, "{\"status\": \"ok\"}");
//! ```

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed} unclosed delimiters. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed: usize,
    },
    #[error("No JSON content found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("static regex is valid"))
}

fn generic_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("static regex is valid"))
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

/// Truncates at a char boundary for log and error previews.
pub fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Returns the byte offset of the delimiter closing the one at offset 0.
///
/// String literals and escape sequences are skipped, so braces inside
/// quoted text do not count.
pub fn find_matching_close(s: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Counts delimiters left open at the end of `s`.
pub fn unclosed_delimiters(s: &str) -> usize {
    let mut depth: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth.max(0) as usize
}

/// Extracts the JSON payload from an LLM response.
pub fn try_extract_json(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    for fence in [json_fence(), generic_fence()] {
        if let Some(body) = fence.captures(trimmed).and_then(|c| c.get(1)) {
            let body = body.as_str().trim();
            if parses(body) {
                return Ok(body.to_string());
            }
        }
    }

    if parses(trimmed) {
        return Ok(trimmed.to_string());
    }

    let mut first_open = None;
    for (start, c) in trimmed.char_indices() {
        if c != '{' && c != '[' {
            continue;
        }
        first_open.get_or_insert(start);
        if let Some(end) = find_matching_close(&trimmed[start..]) {
            let candidate = &trimmed[start..=start + end];
            if parses(candidate) {
                return Ok(candidate.to_string());
            }
        }
    }

    if let Some(start) = first_open {
        let partial = &trimmed[start..];
        let unclosed = unclosed_delimiters(partial);
        if unclosed > 0 {
            return Err(JsonExtractionError::Truncated {
                partial_preview: preview(partial, 200),
                unclosed,
            });
        }
    }

    Err(JsonExtractionError::NotFound {
        content_preview: preview(trimmed, 100),
    })
}
