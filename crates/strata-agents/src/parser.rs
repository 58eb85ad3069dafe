use serde_json::Value;
use tracing::warn;

use crate::error::AgentError;

/// Extract the first JSON value from a string that may contain surrounding text.
///
/// Handles common model response formats:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `Here are the queries:\n{"key": "value"}`
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    // Try parsing the whole thing as JSON first
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<Value>(trimmed).is_ok()
    {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(AgentError::Parse(format!(
        "No valid JSON found in response (length={})",
        text.len()
    )))
}

/// Body of the first fenced block, preferring a ```json tag over a bare fence.
fn extract_from_markdown_block(text: &str) -> Option<String> {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let body_start = start + marker.len();
            if let Some(end) = text[body_start..].find("```") {
                return Some(text[body_start..body_start + end].trim().to_string());
            }
        }
    }
    None
}

/// Find the first balanced { ... } in the text.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the search queries out of a query-generation response.
///
/// Expects `{"queries": [...]}` (optionally fenced). When no such object
/// can be found, falls back to collecting quoted lines. Never fails; the
/// worst case is an empty list. At most `max_queries` are returned.
pub fn parse_queries(raw: &str, max_queries: usize) -> Vec<String> {
    let mut queries = match queries_from_json(raw) {
        Some(queries) => queries,
        None => {
            warn!(len = raw.len(), "Query response is not JSON, scanning lines");
            scan_quoted_lines(raw)
        }
    };
    queries.truncate(max_queries);
    queries
}

fn queries_from_json(raw: &str) -> Option<Vec<String>> {
    let json = extract_json(raw).ok()?;
    let value: Value = serde_json::from_str(&json).ok()?;
    let list = match &value {
        Value::Object(map) => map.get("queries")?.as_array()?,
        Value::Array(items) => items,
        _ => return None,
    };
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Lines that look like quoted strings, with quotes and trailing commas stripped.
fn scan_quoted_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('"') || line.starts_with('\''))
        .map(|line| {
            line.trim_end_matches(',')
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
        })
        // skip key lines such as `"queries": [`
        .filter(|line| !line.is_empty() && !line.contains("\":") && !line.ends_with('['))
        .map(str::to_string)
        .collect()
}
