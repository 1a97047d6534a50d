use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::envs::headers_json;
use crate::error::OracleError;
use crate::request::OracleRequest;

/// Headers embedded when the request carries none.
pub const DEFAULT_HEADERS_JSON: &str = r#"{"Accept": "application/json"}"#;

/// Fixed skeleton of the WASI compute unit: fetch the configured URL,
/// extract the configured JSON path, serialize the result. Five
/// placeholders, every one substituted through [`escape_literal`] so the
/// output stays a valid Rust source text for any input.
const ARTIFACT_TEMPLATE: &str = r####"#[allow(warnings)]
mod bindings;
use bindings::{Guest, Output, TaskQueueInput};

use layer_wasi::{block_on, Reactor, Request, WasiPollable};

use serde::Serialize;

struct Component;

impl Guest for Component {
    fn run_task(_input: TaskQueueInput) -> Output {
        block_on(run_oracle)
    }
}

/// Fetch the configured endpoint, extract the configured JSON path and
/// return the serialized result to write to the chain.
async fn run_oracle(reactor: Reactor) -> Result<Vec<u8>, String> {
    let method = "{{method}}";
    let url = "{{url}}";
    let json_path = "{{json_path}}";
    let body = "{{body}}";

    let mut req = match method {
        "POST" => {
            let mut req = Request::post(url)?;
            req.body = body.as_bytes().to_vec();
            req
        }
        _ => Request::get(url)?,
    };

    let headers_json = "{{headers_json}}";
    let headers_map: serde_json::Value = serde_json::from_str(headers_json)
        .map_err(|e| format!("invalid headers JSON `{}`: {}", headers_json, e))?;
    if let Some(obj) = headers_map.as_object() {
        for (key, value) in obj {
            req.headers
                .push((key.clone(), value.as_str().unwrap_or_default().to_string()));
        }
    }

    let res = reactor.send(req).await?;

    match res.status {
        200 => {
            let json: serde_json::Value = res.json()?;
            let value = jsonpath_lib::select(&json, json_path)
                .map_err(|e| format!("invalid JSON path: {}", e))?
                .first()
                .ok_or_else(|| "no value found at JSON path".to_string())?
                .to_string();
            OracleOutput { value }.to_json()
        }
        status => Err(format!("unexpected status code: {status}")),
    }
}

/// The returned result.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OracleOutput {
    value: String,
}

impl OracleOutput {
    fn to_json(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(&self).map_err(|err| err.to_string())
    }
}

bindings::export!(Component with_types_in bindings);
"####;

static HANDLEBARS: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(escape_literal);
    registry
});

#[derive(Serialize)]
struct TemplateData<'a> {
    method: &'a str,
    url: &'a str,
    json_path: &'a str,
    body: &'a str,
    headers_json: &'a str,
}

/// Render the artifact source for a validated request.
///
/// No validation happens here beyond substitution; the template is
/// trusted and every substituted value is escaped for Rust
/// string-literal syntax.
pub fn render_artifact_source(request: &OracleRequest) -> Result<String, OracleError> {
    let headers_json = if request.headers.is_empty() {
        DEFAULT_HEADERS_JSON.to_string()
    } else {
        headers_json(&request.headers)?
    };
    let data = TemplateData {
        method: &request.method,
        url: &request.url,
        json_path: &request.json_path,
        body: request.body.as_deref().unwrap_or_default(),
        headers_json: &headers_json,
    };
    Ok(HANDLEBARS.render_template(ARTIFACT_TEMPLATE, &data)?)
}

/// Escape a value for embedding inside a double-quoted Rust string
/// literal. Inverse of [`unescape_literal`].
pub fn escape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => {
                out.push_str(&format!("\\u{{{:x}}}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out
}

/// Decode a string previously produced by [`escape_literal`]. Returns
/// `None` on a truncated or unknown escape sequence.
pub fn unescape_literal(escaped: &str) -> Option<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                if chars.next()? != '{' {
                    return None;
                }
                let mut digits = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        digit => digits.push(digit),
                    }
                }
                let code = u32::from_str_radix(&digits, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}
