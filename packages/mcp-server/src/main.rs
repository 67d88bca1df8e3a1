#!/usr/bin/env -S cargo run --bin kubexec-mcp --

use anyhow::{Context, Result};
use clap::Parser;
use kubexec_config::{read_var, DEFAULT_NAME_PREFIX, KUBEXEC_NAME_PREFIX};
use kubexec_executor::{ExecutionConfig, ExecutionManager};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

mod context;
mod mcp;
mod server;
mod tools;

#[cfg(test)]
mod tests;

use context::ToolContext;

#[derive(Parser)]
#[command(name = "kubexec-mcp")]
#[command(about = "Kubexec MCP Server - run code in ephemeral Kubernetes Jobs from an agent")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Display available tools")]
    tools: bool,
    #[arg(long, help = "Namespace for Jobs and ConfigMaps (overrides KUBEXEC_NAMESPACE)")]
    namespace: Option<String>,
    #[arg(long, help = "Container image (overrides KUBEXEC_IMAGE)")]
    image: Option<String>,
    #[arg(long, help = "Seconds to wait for a run (overrides KUBEXEC_TIMEOUT_SECS)")]
    timeout: Option<u64>,
    #[arg(long, help = "Resource name prefix (overrides KUBEXEC_NAME_PREFIX)")]
    prefix: Option<String>,
}

fn init_tracing() {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_config(cli: &Cli) -> Result<ExecutionConfig> {
    let mut config = ExecutionConfig::from_env().context("Invalid KUBEXEC_* configuration")?;
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace.clone());
    }
    if let Some(image) = &cli.image {
        config = config.with_image(image.clone());
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_timeout_seconds(timeout);
    }
    config.validate().context("Invalid command-line configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.tools {
        println!("Available tools:");
        println!("- run_code: Execute Python code in an isolated Kubernetes Job");
        println!("- cleanup_resources: Delete leftover Jobs and ConfigMaps by name prefix");
        return Ok(());
    }

    init_tracing();

    let config = build_config(&cli)?;
    let prefix = cli
        .prefix
        .clone()
        .or_else(|| read_var(KUBEXEC_NAME_PREFIX))
        .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string());

    info!(
        namespace = %config.namespace,
        image = %config.image,
        timeout_seconds = config.timeout_seconds,
        prefix = %prefix,
        "Starting kubexec MCP server"
    );

    let manager = ExecutionManager::connect(config)
        .await
        .context("Failed to connect to Kubernetes")?;
    let context = ToolContext::new(Arc::new(manager)).with_default_prefix(prefix);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    server::serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        context,
        shutdown,
    )
    .await
}
