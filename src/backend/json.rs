//! JSON decoding utilities for Backend API responses.

use anyhow::Result;
use serde_json::Value;

/// Attempt to parse JSON and, on failure, include a contextual snippet of the
/// line where the error occurred along with the serde path and type mismatch.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner_err = err.inner();
            let (line, column) = (inner_err.line(), inner_err.column());
            let path = err.path().to_string();

            let msg = inner_err.to_string();
            let loc = format!(" at line {line} column {column}");
            let msg_without_loc = msg.strip_suffix(&loc).unwrap_or(&msg).to_string();

            let type_info = parse_type_mismatch(&msg_without_loc);
            let snippet = build_error_snippet(body, line, column, 20);

            let mut final_err = String::new();
            if !path.is_empty() && path != "." {
                final_err.push_str(&format!("at path '{}': ", path));
            }
            final_err.push_str(&format!(
                "{} (line {} col {})\n{}",
                type_info, line, column, snippet
            ));

            Err(anyhow::anyhow!(final_err))
        }
    }
}

/// Decode an already-parsed JSON value into `T`, reporting the failing path.
///
/// Used for typed views over passthrough bodies, where there is no source
/// text to build a snippet from.
pub fn from_value_with_path<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let type_info = parse_type_mismatch(&err.inner().to_string());
        if path.is_empty() || path == "." {
            anyhow::anyhow!(type_info)
        } else {
            anyhow::anyhow!("at path '{path}': {type_info}")
        }
    })
}

/// Extract type mismatch information from a serde error message.
///
/// Parses error messages like "invalid type: null, expected a string" into
/// "expected a string, got null". Returns the original message if it does not
/// match a known shape.
fn parse_type_mismatch(error_msg: &str) -> String {
    if let Some(invalid_start) = error_msg.find("invalid type: ") {
        let after_prefix = &error_msg[invalid_start + "invalid type: ".len()..];

        if let Some(comma_pos) = after_prefix.find(", expected ") {
            let actual_type = &after_prefix[..comma_pos];
            let expected_part = &after_prefix[comma_pos + ", expected ".len()..];

            let expected_type = expected_part
                .split(" at line ")
                .next()
                .unwrap_or(expected_part)
                .trim();

            return format!("expected {}, got {}", expected_type, actual_type);
        }
    }

    if error_msg.starts_with("expected ")
        && let Some(expected_part) = error_msg.split(" at line ").next()
    {
        return expected_part.to_string();
    }

    error_msg.to_string()
}

fn build_error_snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target_line = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target_line.is_empty() {
        return "(empty line)".to_string();
    }

    // column is 1-based
    let error_idx = column.saturating_sub(1).min(target_line.len());

    let half_len = context_len / 2;
    let mut start = error_idx.saturating_sub(half_len);
    let mut end = (error_idx + half_len).min(target_line.len());
    while !target_line.is_char_boundary(start) {
        start -= 1;
    }
    while !target_line.is_char_boundary(end) {
        end += 1;
    }

    let slice = &target_line[start..end];
    let indicator = " ".repeat(error_idx - start) + "^";

    format!("...{slice}...\n   {indicator}")
}
