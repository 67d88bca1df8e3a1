// ABOUTME: Shared cluster options and configuration resolution for kubexec subcommands
// ABOUTME: Command-line flags take precedence over KUBEXEC_* environment variables

pub mod cleanup;
pub mod config;
pub mod run;

use anyhow::{Context, Result};
use clap::Args;
use kubexec_config::{read_var, DEFAULT_NAME_PREFIX, KUBEXEC_NAME_PREFIX};
use kubexec_executor::{ExecutionConfig, ExecutionManager, ImagePullPolicy};
use tracing::debug;

#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Namespace for Jobs and ConfigMaps [env: KUBEXEC_NAMESPACE]
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Container image with a python3 interpreter [env: KUBEXEC_IMAGE]
    #[arg(long, global = true)]
    pub image: Option<String>,

    /// Seconds to wait for a run to finish [env: KUBEXEC_TIMEOUT_SECS]
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Image pull policy: Always, IfNotPresent, or Never [env: KUBEXEC_IMAGE_PULL_POLICY]
    #[arg(long, global = true)]
    pub pull_policy: Option<String>,
}

impl ClusterArgs {
    /// Environment configuration with these flags applied on top
    pub fn resolve(&self, base: ExecutionConfig) -> Result<ExecutionConfig> {
        let mut config = base;
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.clone());
        }
        if let Some(image) = &self.image {
            config = config.with_image(image.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout_seconds(timeout);
        }
        if let Some(policy) = &self.pull_policy {
            let policy: ImagePullPolicy = policy.parse()?;
            config = config.with_image_pull_policy(policy);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(&self) -> Result<ExecutionConfig> {
        let base = ExecutionConfig::from_env().context("Invalid KUBEXEC_* configuration")?;
        self.resolve(base)
    }

    pub async fn connect(&self) -> Result<ExecutionManager> {
        let config = self.load()?;
        debug!(
            "Connecting with namespace={} image={} timeout={}s",
            config.namespace, config.image, config.timeout_seconds
        );
        ExecutionManager::connect(config)
            .await
            .context("Failed to connect to Kubernetes")
    }
}

/// Prefix from the flag, then KUBEXEC_NAME_PREFIX, then the default
pub fn resolve_prefix(flag: Option<String>) -> String {
    flag.or_else(|| read_var(KUBEXEC_NAME_PREFIX))
        .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string())
}
