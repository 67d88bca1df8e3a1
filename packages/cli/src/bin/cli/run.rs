// ABOUTME: `kubexec run` executes a Python file (or stdin) in an ephemeral Job
// ABOUTME: Prints the captured logs and exits non-zero when the run fails or errors

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use colored::*;
use kubexec_executor::{ExecutionManager, RunOutcome, RunRequest};
use std::io::Read;

use super::{resolve_prefix, ClusterArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Python file to run, or '-' to read from stdin
    pub file: String,

    /// Package to pip install before running (repeatable)
    #[arg(long = "dep", value_name = "NAME")]
    pub deps: Vec<String>,

    /// Resource name prefix [env: KUBEXEC_NAME_PREFIX]
    #[arg(long)]
    pub prefix: Option<String>,
}

pub fn read_source(file: &str) -> Result<String> {
    if file == "-" {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read code from stdin")?;
        return Ok(code);
    }

    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
}

/// Run `code` and return its logs, or an error when the run did not succeed
pub async fn execute_code(
    manager: &ExecutionManager,
    code: String,
    deps: Vec<String>,
    prefix: String,
) -> Result<String> {
    let request = RunRequest::new(code)
        .with_dependencies(deps)
        .with_prefix(prefix);

    let output = manager.execute(&request).await?;
    match output.outcome {
        RunOutcome::Succeeded => Ok(output.logs),
        RunOutcome::Failed => {
            println!("{}", output.logs);
            Err(anyhow!("Job '{}' failed", output.run_name))
        }
    }
}

pub async fn run_command(args: RunArgs, cluster: &ClusterArgs) -> Result<()> {
    let code = read_source(&args.file)?;
    if code.trim().is_empty() {
        bail!("No code to run in {}", args.file);
    }

    let manager = cluster.connect().await?;
    eprintln!(
        "{} {} in namespace {}",
        "Running".cyan().bold(),
        args.file,
        manager.config().namespace
    );

    let logs = execute_code(&manager, code, args.deps, resolve_prefix(args.prefix)).await?;
    println!("{}", logs);
    Ok(())
}
