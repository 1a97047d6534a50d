use thiserror::Error;

/// Error taxonomy for the oracle pipeline.
///
/// Each variant maps to one stage of the flow: validation, header
/// encoding, template rendering, external tool invocation, output
/// parsing. Nothing here is retried; the HTTP boundary turns every
/// variant into a structured non-2xx response.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` must be a string")]
    InvalidField { field: &'static str },

    #[error("header entry {index} is malformed: {reason}")]
    MalformedHeader { index: usize, reason: &'static str },

    #[error("failed to encode headers as JSON")]
    HeaderEncoding(#[source] serde_json::Error),

    #[error("artifact template render failed")]
    Render(#[from] handlebars::RenderError),

    #[error("deployment tool failed: {stderr}")]
    Deployment { stderr: String },

    #[error("deployment tool timed out after {seconds}s")]
    DeploymentTimeout { seconds: u64 },

    #[error("malformed result payload from operator `{operator_url}`: {reason}")]
    MalformedResult { operator_url: String, reason: String },
}
