use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Task queue the deploy tool submits artifacts to when none is
/// configured.
pub const DEFAULT_TASK_QUEUE: &str =
    "layer1f2tn7zp423zx0ddx8qvapr3kkvs6ygu5zdrsllzjhkak3qtljflsjahk08";

/// Host configuration, loadable from a TOML or JSON file with CLI
/// overrides on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Port the HTTP server binds on.
    pub port: u16,
    /// External deploy/test tool binary.
    pub tool_path: PathBuf,
    /// Fixed path the rendered artifact source is staged into; the
    /// build command reads it from there.
    pub artifact_source_path: PathBuf,
    /// Compiled artifact handed to the deploy subcommand.
    pub artifact_wasm_path: PathBuf,
    /// Build command run before each deploy, as an argument vector.
    pub build_command: Vec<String>,
    /// Task queue address passed to the deploy subcommand.
    pub task_queue_address: String,
    pub deploy_timeout_secs: u64,
    pub test_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            tool_path: PathBuf::from("avs-toolkit-cli"),
            artifact_source_path: PathBuf::from("wasi/oracle-example/src/lib.rs"),
            artifact_wasm_path: PathBuf::from(
                "target/wasm32-wasip1/release/oracle_example.wasm",
            ),
            build_command: vec!["./scripts/build_wasi.sh".to_string()],
            task_queue_address: DEFAULT_TASK_QUEUE.to_string(),
            deploy_timeout_secs: 300,
            test_timeout_secs: 120,
        }
    }
}

impl HostConfig {
    /// Load from an optional config file; the format follows the file
    /// extension (json, or toml otherwise).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("invalid JSON config {}", path.display()))?,
            _ => toml::from_str(&contents)
                .with_context(|| format!("invalid TOML config {}", path.display()))?,
        };
        Ok(config)
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }
}
