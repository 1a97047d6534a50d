use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use oracle_core::{DeploymentEnvironment, OracleError};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::HostConfig;

/// Wrapper around the external deploy/test tool.
///
/// Every invocation is an argument vector (no shell), runs with piped
/// stdout/stderr and a configured timeout. The deployment environment is
/// passed as repeated `--env NAME=VALUE` flags, one variable per flag,
/// so values containing commas or equals signs survive intact.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    tool_path: PathBuf,
    build_command: Vec<String>,
    task_queue_address: String,
    deploy_timeout: Duration,
    test_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            tool_path: config.tool_path.clone(),
            build_command: config.build_command.clone(),
            task_queue_address: config.task_queue_address.clone(),
            deploy_timeout: config.deploy_timeout(),
            test_timeout: config.test_timeout(),
        }
    }

    /// Run the configured build command over the staged artifact source.
    pub async fn build_artifact(&self) -> Result<(), OracleError> {
        let Some((program, args)) = self.build_command.split_first() else {
            return Ok(());
        };
        let mut command = Command::new(program);
        command.args(args);
        let output = self.run(command, self.deploy_timeout, "build").await?;
        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "artifact build finished"
        );
        Ok(())
    }

    /// Deploy the compiled artifact under `name`, marked testable, with
    /// the given environment attached.
    pub async fn deploy(
        &self,
        name: &str,
        wasm_path: &Path,
        envs: &DeploymentEnvironment,
    ) -> Result<(), OracleError> {
        debug!(wasm = %wasm_path.display(), "deploying artifact");
        let mut command = Command::new(&self.tool_path);
        command
            .arg("wasmatic")
            .arg("deploy")
            .arg("--name")
            .arg(name)
            .arg("--wasm-source")
            .arg(wasm_path)
            .arg("--testable");
        for (key, value) in envs.vars() {
            command.arg("--env").arg(format!("{key}={value}"));
        }
        command.arg("--task").arg(&self.task_queue_address);
        self.run(command, self.deploy_timeout, "deploy").await?;
        info!(name, "oracle deployed");
        Ok(())
    }

    /// Run the tool's test subcommand for `name` and return its stdout.
    pub async fn test(&self, name: &str) -> Result<String, OracleError> {
        let mut command = Command::new(&self.tool_path);
        command.arg("wasmatic").arg("test").arg("--name").arg(name);
        let output = self.run(command, self.test_timeout, "test").await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run(
        &self,
        mut command: Command,
        limit: Duration,
        label: &str,
    ) -> Result<std::process::Output, OracleError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!(label, ?command, "invoking deploy tool");
        let output = timeout(limit, command.output())
            .await
            .map_err(|_| OracleError::DeploymentTimeout {
                seconds: limit.as_secs(),
            })?
            .map_err(|err| OracleError::Deployment {
                stderr: format!("failed to spawn {label} command: {err}"),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OracleError::Deployment {
                stderr: if stderr.is_empty() {
                    format!("{label} command exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }
        Ok(output)
    }
}
