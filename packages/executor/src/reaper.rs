// ABOUTME: Resource reaper that removes a run's Job and ConfigMap on every exit path
// ABOUTME: Also sweeps leaked resources by name prefix for manual recovery

use crate::error::CleanupError;
use crate::manager::prefix_problem;
use crate::platform::{Platform, PlatformError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one resource during cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    Deleted,
    AlreadyAbsent,
    Failed,
}

impl Removal {
    /// True when the resource is gone, whoever removed it
    pub fn is_gone(&self) -> bool {
        matches!(self, Removal::Deleted | Removal::AlreadyAbsent)
    }
}

/// Cleanup result for a single run; never an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub run: Removal,
    pub payload: Removal,
    pub errors: Vec<String>,
}

impl ReapReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of a prefix sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapSummary {
    pub prefix: String,
    pub dry_run: bool,
    pub matched_runs: Vec<String>,
    pub matched_payloads: Vec<String>,
    pub removed_runs: usize,
    pub removed_payloads: usize,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct ResourceReaper {
    platform: Arc<dyn Platform>,
    namespace: String,
}

impl ResourceReaper {
    pub fn new(platform: Arc<dyn Platform>, namespace: impl Into<String>) -> Self {
        Self {
            platform,
            namespace: namespace.into(),
        }
    }

    /// Delete the run (with its pods) and then the payload.
    ///
    /// The two deletions are independent: a failure on the run does not stop
    /// the payload from being removed. Safe to call any number of times.
    pub async fn reap(&self, run_name: &str, payload_name: &str) -> ReapReport {
        let mut errors = Vec::new();

        let run = classify(
            self.platform.delete_run(&self.namespace, run_name).await,
            "job",
            run_name,
            &mut errors,
        );
        let payload = classify(
            self.platform
                .delete_payload(&self.namespace, payload_name)
                .await,
            "configmap",
            payload_name,
            &mut errors,
        );

        if errors.is_empty() {
            info!(run_name, payload_name, "Cleaned up run resources");
        }

        ReapReport {
            run,
            payload,
            errors,
        }
    }

    /// Delete every Job and ConfigMap whose name starts with `prefix`.
    ///
    /// The prefix must be one a run could have been created with, so an
    /// empty or malformed prefix is refused before anything is listed.
    /// Listing failures abort the sweep; individual deletion failures are
    /// collected in the summary.
    pub async fn reap_all_by_prefix(
        &self,
        prefix: &str,
        dry_run: bool,
    ) -> Result<ReapSummary, CleanupError> {
        if let Some(detail) = prefix_problem(prefix) {
            warn!(prefix, "Refusing prefix sweep: {}", detail);
            return Err(CleanupError::InvalidPrefix(detail));
        }

        let matching = |names: Vec<String>| -> Vec<String> {
            names
                .into_iter()
                .filter(|name| name.starts_with(prefix))
                .collect()
        };

        let matched_runs = matching(self.platform.list_runs(&self.namespace).await?);
        let matched_payloads = matching(self.platform.list_payloads(&self.namespace).await?);

        info!(
            prefix,
            namespace = %self.namespace,
            runs = matched_runs.len(),
            payloads = matched_payloads.len(),
            dry_run,
            "Found resources matching prefix"
        );

        let mut summary = ReapSummary {
            prefix: prefix.to_string(),
            dry_run,
            matched_runs,
            matched_payloads,
            ..Default::default()
        };

        if dry_run {
            return Ok(summary);
        }

        for name in &summary.matched_runs {
            let result = self.platform.delete_run(&self.namespace, name).await;
            if classify(result, "job", name, &mut summary.errors) == Removal::Deleted {
                summary.removed_runs += 1;
            }
        }
        for name in &summary.matched_payloads {
            let result = self.platform.delete_payload(&self.namespace, name).await;
            if classify(result, "configmap", name, &mut summary.errors) == Removal::Deleted {
                summary.removed_payloads += 1;
            }
        }

        Ok(summary)
    }
}

fn classify(
    result: Result<(), PlatformError>,
    kind: &str,
    name: &str,
    errors: &mut Vec<String>,
) -> Removal {
    match result {
        Ok(()) => {
            debug!(kind, name, "Deleted");
            Removal::Deleted
        }
        Err(e) if e.is_not_found() => {
            debug!(kind, name, "Already absent");
            Removal::AlreadyAbsent
        }
        Err(e) => {
            let message = format!("Failed to delete {} {}: {}", kind, name, e);
            warn!("{}", message);
            errors.push(message);
            Removal::Failed
        }
    }
}
