use serde::Serialize;
use serde_json::Value;

use crate::error::OracleError;

const OPERATOR_LABEL: &str = "Output for operator `";

/// One operator's response, in the order it appeared in the test
/// output. The same operator URL may appear more than once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorResult {
    #[serde(rename = "operatorUrl")]
    pub operator_url: String,
    pub output: Value,
}

/// Extract every operator result from the deploy tool's free-text test
/// output.
///
/// Each match is the fixed label, an `https://` URL up to the closing
/// backtick, a colon, then one JSON object captured by balanced-depth
/// scanning (so nested objects come back whole). Text with no matches
/// yields an empty list. One undecodable payload aborts the whole
/// parse, naming the operator whose payload failed.
pub fn parse_test_output(output: &str) -> Result<Vec<OperatorResult>, OracleError> {
    let mut results = Vec::new();
    let mut rest = output;
    while let Some(label) = rest.find(OPERATOR_LABEL) {
        rest = &rest[label + OPERATOR_LABEL.len()..];
        let Some(close) = rest.find('`') else {
            break;
        };
        let url = &rest[..close];
        rest = &rest[close + 1..];
        if !url.starts_with("https://") {
            continue;
        }
        let Some(tail) = rest.strip_prefix(':') else {
            continue;
        };
        let tail = tail.trim_start();
        if !tail.starts_with('{') {
            continue;
        }
        let captured = balanced_object(tail).ok_or_else(|| OracleError::MalformedResult {
            operator_url: url.to_string(),
            reason: "unterminated JSON object".to_string(),
        })?;
        let output = serde_json::from_str(captured).map_err(|err| OracleError::MalformedResult {
            operator_url: url.to_string(),
            reason: err.to_string(),
        })?;
        results.push(OperatorResult {
            operator_url: url.to_string(),
            output,
        });
        rest = &tail[captured.len()..];
    }
    Ok(results)
}

/// Slice of `text` covering the balanced JSON object it starts with.
/// Brace counting skips string contents, including escaped quotes.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}
