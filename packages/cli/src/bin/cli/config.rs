// ABOUTME: `kubexec config show` prints the effective execution settings
// ABOUTME: Reflects environment variables and command-line overrides without contacting the cluster

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use kubexec_executor::ExecutionConfig;
use serde_json::json;

use super::{resolve_prefix, ClusterArgs};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn config_rows(config: &ExecutionConfig, prefix: &str) -> Vec<(&'static str, String)> {
    vec![
        ("Namespace", config.namespace.clone()),
        ("Image", config.image.clone()),
        ("Timeout (s)", config.timeout_seconds.to_string()),
        (
            "Pull policy",
            config
                .image_pull_policy
                .map(|p| p.to_string())
                .unwrap_or_else(|| "(cluster default)".to_string()),
        ),
        ("Name prefix", prefix.to_string()),
    ]
}

impl ConfigCommands {
    pub fn execute(&self, cluster: &ClusterArgs) -> Result<()> {
        match self {
            ConfigCommands::Show { json } => {
                let config = cluster.load()?;
                let prefix = resolve_prefix(None);

                if *json {
                    let value = json!({
                        "config": config,
                        "name_prefix": prefix,
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .apply_modifier(UTF8_ROUND_CORNERS);
                table.set_header(vec!["Setting", "Value"]);
                for (key, value) in config_rows(&config, &prefix) {
                    table.add_row(vec![key.to_string(), value]);
                }
                println!("{}", table);
                Ok(())
            }
        }
    }
}
