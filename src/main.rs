//! SQL Server MCP Server entry point.
//!
//! Serves MCP over stdio. Logs go to stderr because stdout carries JSON-RPC.

use anyhow::Result;
use rmcp::ServiceExt;
use sqlserver_mcp_server::shutdown::install_signal_handlers;
use sqlserver_mcp_server::{Config, SqlServerMcp};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "SQL Server MCP Server starting (transport: stdio)"
    );

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let server = SqlServerMcp::from_config(config)?;

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let service = server.serve(rmcp::transport::stdio()).await?;

    tokio::select! {
        quit_reason = service.waiting() => {
            match quit_reason {
                Ok(reason) => info!("Service stopped: {reason:?}"),
                Err(e) => warn!("Service error: {e}"),
            }
        }
        _ = shutdown.cancelled() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,sqlserver_mcp_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
