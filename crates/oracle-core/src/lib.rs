//! Translation core for the oracle builder.
//!
//! This crate turns a declarative oracle request (HTTP method, target URL,
//! JSON-path extraction expression, optional body and headers) into the two
//! encodings consumed by the deploy tool: a deployment environment and a
//! rendered WASI artifact source. It also parses the tool's free-text test
//! output back into structured per-operator results. Everything here is
//! pure; file staging and subprocess invocation live in `oracle-host`.

pub mod envs;
pub mod error;
pub mod parser;
pub mod request;
pub mod template;

pub use envs::{DeploymentEnvironment, encode_environment};
pub use error::OracleError;
pub use parser::{OperatorResult, parse_test_output};
pub use request::{Header, OracleRequest};
pub use template::render_artifact_source;
