// ABOUTME: `kubexec cleanup` deletes leaked Jobs and ConfigMaps by name prefix
// ABOUTME: Supports dry runs and JSON output for scripting

use anyhow::{bail, Result};
use clap::Args;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use kubexec_executor::ReapSummary;

use super::{resolve_prefix, ClusterArgs};

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Delete resources whose names start with this prefix [env: KUBEXEC_NAME_PREFIX]
    #[arg(long)]
    pub prefix: Option<String>,

    /// List matching resources without deleting them
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn summary_table(summary: &ReapSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Kind", "Name"]);
    for name in &summary.matched_runs {
        table.add_row(vec!["Job", name.as_str()]);
    }
    for name in &summary.matched_payloads {
        table.add_row(vec!["ConfigMap", name.as_str()]);
    }
    table
}

pub async fn cleanup_command(args: CleanupArgs, cluster: &ClusterArgs) -> Result<()> {
    let prefix = resolve_prefix(args.prefix);
    let manager = cluster.connect().await?;
    let summary = manager.reap_all_by_prefix(&prefix, args.dry_run).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if summary.matched_runs.is_empty() && summary.matched_payloads.is_empty() {
        println!(
            "No resources starting with '{}' in namespace {}",
            prefix,
            manager.config().namespace
        );
    } else {
        println!("{}", summary_table(&summary));
        if summary.dry_run {
            println!("{} nothing deleted", "Dry run:".yellow().bold());
        } else {
            println!(
                "{} {} job(s), {} configmap(s)",
                "Deleted".green().bold(),
                summary.removed_runs,
                summary.removed_payloads
            );
        }
    }

    if !summary.errors.is_empty() {
        for error in &summary.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        bail!("{} resource(s) could not be deleted", summary.errors.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_both_kinds() {
        let summary = ReapSummary {
            prefix: "code-runner".to_string(),
            matched_runs: vec!["code-runner-job-a1".to_string()],
            matched_payloads: vec!["code-runner-configmap-a1".to_string()],
            ..Default::default()
        };

        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("Job"));
        assert!(rendered.contains("code-runner-job-a1"));
        assert!(rendered.contains("ConfigMap"));
        assert!(rendered.contains("code-runner-configmap-a1"));
    }
}
