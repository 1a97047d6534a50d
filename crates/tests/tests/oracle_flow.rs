#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use oracle_host::{AppState, HostConfig, router};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

/// Write an executable stub standing in for `avs-toolkit-cli`.
fn write_stub_tool(dir: &Path, body: &str) -> Result<PathBuf> {
    let path = dir.join("avs-toolkit-cli");
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}

fn test_router(workspace: &TempDir, stub_body: &str) -> Result<(Router, HostConfig)> {
    let tool_path = write_stub_tool(workspace.path(), stub_body)?;
    let config = HostConfig {
        port: 0,
        tool_path,
        artifact_source_path: workspace.path().join("src").join("lib.rs"),
        artifact_wasm_path: workspace.path().join("oracle_example.wasm"),
        build_command: Vec::new(),
        task_queue_address: "layer1testqueue".to_string(),
        deploy_timeout_secs: 10,
        test_timeout_secs: 10,
    };
    Ok((router(AppState::new(config.clone())), config))
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

fn create_request(name: &str, payload: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(format!("/create_oracle?name={name}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(payload)?))?)
}

#[tokio::test]
async fn deploy_passes_exact_env_flags_and_stages_artifact() -> Result<()> {
    let workspace = TempDir::new()?;
    let args_log = workspace.path().join("args.log");
    let stub = format!(
        "for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done >> \"{}\"",
        args_log.display()
    );
    let (app, config) = test_router(&workspace, &stub)?;

    let payload = json!({
        "method": "GET",
        "url": "https://api.example.com/v1/price?vs=usd",
        "jsonPath": "$.price",
        "headers": [
            {"key": "Cookie", "value": "a=1,b=2"},
        ],
    });
    let response = app.oneshot(create_request("btc-price", &payload)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?, json!({"message": "success"}));

    // each argument arrives as its own line, so separators in values
    // cannot collide with the flag encoding
    let args: Vec<String> = fs::read_to_string(&args_log)?
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(args[0], "wasmatic");
    assert_eq!(args[1], "deploy");
    assert!(args.iter().any(|arg| arg == "--testable"));
    assert!(
        args.iter()
            .any(|arg| arg == "REQUEST_HEADERS={\"Cookie\":\"a=1,b=2\"}"),
        "env flag lost its separators: {args:?}"
    );
    let name_idx = args.iter().position(|arg| arg == "--name").unwrap();
    assert_eq!(args[name_idx + 1], "btc-price");
    let task_idx = args.iter().position(|arg| arg == "--task").unwrap();
    assert_eq!(args[task_idx + 1], "layer1testqueue");

    let staged = fs::read_to_string(&config.artifact_source_path)?;
    assert!(staged.contains("let url = \"https://api.example.com/v1/price?vs=usd\";"));
    Ok(())
}

#[tokio::test]
async fn deploy_failure_maps_to_bad_gateway_with_stderr() -> Result<()> {
    let workspace = TempDir::new()?;
    let (app, _) = test_router(&workspace, "echo 'deploy rejected by fleet' >&2\nexit 1")?;

    let payload = json!({
        "method": "GET",
        "url": "https://api.example.com",
        "jsonPath": "$.price",
    });
    let response = app.oneshot(create_request("demo", &payload)?).await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await?;
    assert_eq!(body["error"]["code"], "deployment");
    assert_eq!(body["error"]["message"], "deployment tool failed: deploy rejected by fleet");
    Ok(())
}

#[tokio::test]
async fn missing_url_is_a_validation_error_naming_the_field() -> Result<()> {
    let workspace = TempDir::new()?;
    let (app, _) = test_router(&workspace, "exit 0")?;

    let payload = json!({"method": "GET", "jsonPath": "$.price"});
    let response = app.oneshot(create_request("demo", &payload)?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["error"]["code"], "validation");
    assert_eq!(body["error"]["message"], "missing required field `url`");
    Ok(())
}

#[tokio::test]
async fn query_parses_stub_output_end_to_end() -> Result<()> {
    let workspace = TempDir::new()?;
    let stub = "if [ \"$2\" = \"test\" ]; then\n\
                printf 'Output for operator `https://a.com`: {\"price\":{\"usd\":1}}\\n'\n\
                printf 'Output for operator `https://b.com`: {\"price\":{\"usd\":2}}\\n'\n\
                fi";
    let (app, _) = test_router(&workspace, stub)?;

    let response = app
        .oneshot(Request::builder().uri("/query_oracle?name=demo").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(
        body,
        json!({
            "results": [
                {"operatorUrl": "https://a.com", "output": {"price": {"usd": 1}}},
                {"operatorUrl": "https://b.com", "output": {"price": {"usd": 2}}},
            ]
        })
    );
    Ok(())
}

#[tokio::test]
async fn query_with_no_operator_output_returns_empty_results() -> Result<()> {
    let workspace = TempDir::new()?;
    let (app, _) = test_router(&workspace, "echo 'no responding operators'")?;

    let response = app
        .oneshot(Request::builder().uri("/query_oracle?name=demo").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?, json!({"results": []}));
    Ok(())
}

#[tokio::test]
async fn malformed_operator_payload_maps_to_parse_error() -> Result<()> {
    let workspace = TempDir::new()?;
    let stub = "printf 'Output for operator `https://a.com`: {\"price\": }\\n'";
    let (app, _) = test_router(&workspace, stub)?;

    let response = app
        .oneshot(Request::builder().uri("/query_oracle?name=demo").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await?;
    assert_eq!(body["error"]["code"], "parse");
    Ok(())
}

#[tokio::test]
async fn hung_tool_times_out_as_gateway_timeout() -> Result<()> {
    let workspace = TempDir::new()?;
    let tool_path = write_stub_tool(workspace.path(), "sleep 5")?;
    let config = HostConfig {
        port: 0,
        tool_path,
        artifact_source_path: workspace.path().join("src").join("lib.rs"),
        artifact_wasm_path: workspace.path().join("oracle_example.wasm"),
        build_command: Vec::new(),
        task_queue_address: "layer1testqueue".to_string(),
        deploy_timeout_secs: 1,
        test_timeout_secs: 1,
    };
    let app = router(AppState::new(config));

    let response = app
        .oneshot(Request::builder().uri("/query_oracle?name=demo").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await?;
    assert_eq!(body["error"]["code"], "timeout");
    assert_eq!(
        body["error"]["message"],
        "deployment tool timed out after 1s"
    );
    Ok(())
}

#[tokio::test]
async fn invalid_json_body_gets_the_structured_error_envelope() -> Result<()> {
    let workspace = TempDir::new()?;
    let (app, _) = test_router(&workspace, "exit 0")?;

    let request = Request::builder()
        .method("POST")
        .uri("/create_oracle?name=demo")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["error"]["code"], "validation");
    assert!(body["error"]["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn cors_headers_are_present_on_responses() -> Result<()> {
    let workspace = TempDir::new()?;
    let (app, _) = test_router(&workspace, "exit 0")?;

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty())?)
        .await?;
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    Ok(())
}

#[tokio::test]
async fn shell_hostile_oracle_name_is_rejected() -> Result<()> {
    let workspace = TempDir::new()?;
    let (app, config) = test_router(&workspace, "exit 0")?;

    let payload = json!({
        "method": "GET",
        "url": "https://api.example.com",
        "jsonPath": "$.price",
    });
    let response = app
        .oneshot(create_request("demo%20--task%20evil", &payload)?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // rejected before anything was staged or invoked
    assert!(!config.artifact_source_path.exists());
    Ok(())
}
