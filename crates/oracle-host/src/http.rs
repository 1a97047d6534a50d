use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, Request, State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::warn;

use oracle_core::{
    OracleError, OracleRequest, encode_environment, parse_test_output, render_artifact_source,
};

use crate::artifact::stage_artifact_source;
use crate::config::HostConfig;
use crate::deploy::ToolInvoker;

/// Shared server state. `deploy_lock` serializes the whole
/// render→stage→build→deploy pipeline: the staged artifact source lives
/// at one fixed path, and two racing deploys must not interleave on it.
pub struct AppState {
    pub config: HostConfig,
    pub invoker: ToolInvoker,
    deploy_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: HostConfig) -> Arc<Self> {
        let invoker = ToolInvoker::new(&config);
        Arc::new(Self {
            config,
            invoker,
            deploy_lock: Mutex::new(()),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/create_oracle", post(create_oracle))
        .route("/query_oracle", get(query_oracle))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Structured error body: `{"error": {"code": ..., "message": ...}}`
/// with a status drawn from the pipeline taxonomy.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation",
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: err.to_string(),
        }
    }
}

impl From<OracleError> for ApiError {
    fn from(err: OracleError) -> Self {
        let (status, code) = match &err {
            OracleError::MissingField { .. }
            | OracleError::InvalidField { .. }
            | OracleError::MalformedHeader { .. } => (StatusCode::BAD_REQUEST, "validation"),
            OracleError::HeaderEncoding(_) => (StatusCode::BAD_REQUEST, "encoding"),
            OracleError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render"),
            OracleError::Deployment { .. } => (StatusCode::BAD_GATEWAY, "deployment"),
            OracleError::DeploymentTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            OracleError::MalformedResult { .. } => (StatusCode::BAD_GATEWAY, "parse"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": { "code": self.code, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: String,
}

/// Oracle names travel as subprocess arguments; keep them printable and
/// whitespace-free.
fn validate_name(name: &str) -> Result<&str, ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("oracle name must not be empty"));
    }
    if name.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ApiError::bad_request(
            "oracle name must not contain whitespace or control characters",
        ));
    }
    Ok(name)
}

async fn create_oracle(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let name = validate_name(&query.name)?;
    let Json(payload) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let request = OracleRequest::from_value(&payload)?;
    let envs = encode_environment(&request)?;
    let source = render_artifact_source(&request)?;

    let _guard = state.deploy_lock.lock().await;
    stage_artifact_source(&source, &state.config.artifact_source_path)
        .map_err(ApiError::internal)?;
    state.invoker.build_artifact().await?;
    state
        .invoker
        .deploy(name, &state.config.artifact_wasm_path, &envs)
        .await?;
    Ok(Json(json!({"message": "success"})))
}

async fn query_oracle(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Value>, ApiError> {
    let name = validate_name(&query.name)?;
    let stdout = state.invoker.test(name).await?;
    let results = parse_test_output(&stdout).inspect_err(|err| {
        warn!(name, error = %err, "test output did not parse");
    })?;
    Ok(Json(json!({"results": results})))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Permissive CORS, matching what the original service exposes to its
/// request-builder front end.
async fn cors(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,PUT,POST,DELETE,OPTIONS"),
    );
    response
}
