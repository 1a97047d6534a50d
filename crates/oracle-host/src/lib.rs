//! Host runtime for the oracle builder.
//!
//! Wraps the pure translation core (`oracle-core`) with everything that
//! touches the outside world: configuration, staging the rendered
//! artifact source on disk, invoking the external deploy/test tool, and
//! the HTTP surface the request-builder front end talks to.

pub mod artifact;
pub mod config;
pub mod deploy;
pub mod http;

pub use config::HostConfig;
pub use deploy::ToolInvoker;
pub use http::{AppState, router};

use anyhow::{Context, Result};
use tracing::info;

/// Bind and serve until ctrl-c.
pub async fn run(config: HostConfig) -> Result<()> {
    let port = config.port;
    let state = AppState::new(config);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "oracle host listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
