use serde_json::{Map as JsonMap, Value};

use crate::error::OracleError;
use crate::request::{Header, OracleRequest};

pub const ENV_HTTP_METHOD: &str = "HTTP_METHOD";
pub const ENV_REQUEST_URL: &str = "REQUEST_URL";
pub const ENV_JSON_PATH: &str = "JSON_PATH";
pub const ENV_REQUEST_BODY: &str = "REQUEST_BODY";
pub const ENV_REQUEST_HEADERS: &str = "REQUEST_HEADERS";

/// Ordered set of environment variables attached to a deployment.
///
/// Derived fresh per request and handed to the deploy tool as explicit
/// arguments; it is never written into the server's own environment
/// table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentEnvironment {
    vars: Vec<(String, String)>,
}

impl DeploymentEnvironment {
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.push((name.to_string(), value.into()));
    }
}

/// Map a validated request onto the deployment environment.
///
/// `HTTP_METHOD`, `REQUEST_URL` and `JSON_PATH` are copied verbatim.
/// `REQUEST_BODY` is set iff a non-empty body is present.
/// `REQUEST_HEADERS` is set iff headers are present, serialized as a
/// JSON object; see [`headers_json`] for the duplicate-key rule.
pub fn encode_environment(request: &OracleRequest) -> Result<DeploymentEnvironment, OracleError> {
    let mut envs = DeploymentEnvironment::default();
    envs.set(ENV_HTTP_METHOD, &request.method);
    envs.set(ENV_REQUEST_URL, &request.url);
    envs.set(ENV_JSON_PATH, &request.json_path);
    if let Some(body) = request.body.as_deref()
        && !body.is_empty()
    {
        envs.set(ENV_REQUEST_BODY, body);
    }
    if !request.headers.is_empty() {
        envs.set(ENV_REQUEST_HEADERS, headers_json(&request.headers)?);
    }
    Ok(envs)
}

/// Serialize headers as a JSON object keyed by header name.
///
/// Entry order is preserved. A later entry with a duplicate key
/// overwrites the earlier value; this is the canonical behavior, matching
/// what the downstream JSON-path consumer expects from an object.
pub fn headers_json(headers: &[Header]) -> Result<String, OracleError> {
    let mut map = JsonMap::new();
    for header in headers {
        map.insert(header.key.clone(), Value::String(header.value.clone()));
    }
    serde_json::to_string(&Value::Object(map)).map_err(OracleError::HeaderEncoding)
}
