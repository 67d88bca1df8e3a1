use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

use cli::cleanup::{cleanup_command, CleanupArgs};
use cli::config::ConfigCommands;
use cli::run::{run_command, RunArgs};
use cli::ClusterArgs;

#[derive(Parser)]
#[command(name = "kubexec")]
#[command(about = "Kubexec CLI - run code in ephemeral Kubernetes Jobs")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    cluster: ClusterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Python file in a fresh Job and print its output
    Run(RunArgs),
    /// Delete leftover Jobs and ConfigMaps by name prefix
    Cleanup(CleanupArgs),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false) // Don't show module paths in logs
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match handle_command(cli.command, &cli.cluster).await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

async fn handle_command(command: Commands, cluster: &ClusterArgs) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run_command(args, cluster).await,
        Commands::Cleanup(args) => cleanup_command(args, cluster).await,
        Commands::Config(config_cmd) => config_cmd.execute(cluster),
    }
}
