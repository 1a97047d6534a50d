use serde_json::Value;

use crate::error::OracleError;

/// One HTTP header carried by an oracle request. Entry order is
/// preserved; keys need not be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// A validated oracle definition.
///
/// `method`, `url` and `json_path` are always non-empty once
/// construction through [`OracleRequest::from_value`] succeeds.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub method: String,
    pub url: String,
    pub json_path: String,
    pub body: Option<String>,
    pub headers: Vec<Header>,
}

impl OracleRequest {
    /// Validate a raw JSON request body into an [`OracleRequest`].
    ///
    /// The extraction expression is accepted under either `jsonPath` or
    /// `selectedPath` (the request-builder front end sends the latter).
    pub fn from_value(value: &Value) -> Result<Self, OracleError> {
        let method = required_string(value, "method")?;
        let url = required_string(value, "url")?;
        let json_path = match value.get("jsonPath") {
            Some(raw) => coerce_string(raw, "jsonPath")?,
            None => match value.get("selectedPath") {
                Some(raw) => coerce_string(raw, "selectedPath")?,
                None => None,
            },
        }
        .filter(|path| !path.is_empty())
        .ok_or(OracleError::MissingField { field: "jsonPath" })?;

        let body = match value.get("body") {
            Some(raw) => coerce_string(raw, "body")?.filter(|body| !body.is_empty()),
            None => None,
        };
        let headers = match value.get("headers") {
            Some(raw) if !raw.is_null() => parse_headers(raw)?,
            _ => Vec::new(),
        };

        Ok(Self {
            method,
            url,
            json_path,
            body,
            headers,
        })
    }
}

fn required_string(value: &Value, field: &'static str) -> Result<String, OracleError> {
    match value.get(field) {
        Some(raw) => coerce_string(raw, field)?,
        None => None,
    }
    .filter(|text| !text.is_empty())
    .ok_or(OracleError::MissingField { field })
}

fn coerce_string(raw: &Value, field: &'static str) -> Result<Option<String>, OracleError> {
    match raw {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        _ => Err(OracleError::InvalidField { field }),
    }
}

fn parse_headers(raw: &Value) -> Result<Vec<Header>, OracleError> {
    let entries = raw.as_array().ok_or(OracleError::MalformedHeader {
        index: 0,
        reason: "headers must be an array of {key, value} objects",
    })?;
    let mut headers = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let key = entry
            .get("key")
            .and_then(Value::as_str)
            .ok_or(OracleError::MalformedHeader {
                index,
                reason: "entry is missing a string `key`",
            })?;
        if key.trim().is_empty() {
            return Err(OracleError::MalformedHeader {
                index,
                reason: "entry has an empty `key`",
            });
        }
        let value = entry
            .get("value")
            .and_then(Value::as_str)
            .ok_or(OracleError::MalformedHeader {
                index,
                reason: "entry is missing a string `value`",
            })?;
        headers.push(Header {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(headers)
}
