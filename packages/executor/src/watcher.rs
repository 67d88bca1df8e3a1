// ABOUTME: Completion watcher that polls a run until it finishes or its deadline passes
// ABOUTME: Collects pod logs for succeeded and failed runs and tolerates not-yet-visible Jobs

use crate::error::WatchError;
use crate::platform::{ExecutionSurface, Platform, PlatformError, RunPhase};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Delay between status reads of a running Job
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Delay after a status read that could not find the Job yet
pub const NOT_FOUND_RETRY: Duration = Duration::from_secs(1);

/// Prefix placed before the logs of a failed run
pub const FAILURE_MARKER: &str = "Job failed. Logs:\n";

pub const NO_POD_MESSAGE: &str =
    "Could not find pod for the job. It might have been deleted or failed to start.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// Captured result of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    pub run_name: String,
    pub outcome: RunOutcome,
    /// Interleaved stdout/stderr, trimmed
    pub logs: String,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Text handed back to string-only callers
    pub fn render(&self) -> String {
        match self.outcome {
            RunOutcome::Succeeded => self.logs.clone(),
            RunOutcome::Failed => format!("{}{}", FAILURE_MARKER, self.logs),
        }
    }
}

impl fmt::Display for RunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub struct CompletionWatcher {
    platform: Arc<dyn Platform>,
    namespace: String,
}

impl CompletionWatcher {
    pub fn new(platform: Arc<dyn Platform>, namespace: impl Into<String>) -> Self {
        Self {
            platform,
            namespace: namespace.into(),
        }
    }

    /// Poll `run_name` until it reaches a terminal phase.
    ///
    /// The deadline counts from the first status read. A failed run is a
    /// normal result; only the deadline and unexpected API errors are errors.
    pub async fn await_completion(
        &self,
        run_name: &str,
        timeout_seconds: u64,
    ) -> Result<RunOutput, WatchError> {
        let timeout = Duration::from_secs(timeout_seconds);
        let started = Instant::now();

        loop {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(run_name, timeout_seconds, "Job did not finish before deadline");
                return Err(WatchError::Timeout {
                    run_name: run_name.to_string(),
                    timeout_seconds,
                });
            }
            let remaining = timeout - elapsed;

            match self.platform.read_run_phase(&self.namespace, run_name).await {
                Ok(RunPhase::Succeeded) => {
                    info!(run_name, "Job succeeded");
                    return Ok(self.output(run_name, RunOutcome::Succeeded).await);
                }
                Ok(RunPhase::Failed) => {
                    info!(run_name, "Job failed");
                    return Ok(self.output(run_name, RunOutcome::Failed).await);
                }
                Ok(phase) => {
                    debug!(run_name, ?phase, "Job still in progress");
                    sleep(POLL_INTERVAL.min(remaining)).await;
                }
                Err(e) if e.is_not_found() => {
                    debug!(run_name, "Job not visible yet, retrying");
                    sleep(NOT_FOUND_RETRY.min(remaining)).await;
                }
                Err(e) => return Err(WatchError::Platform(e)),
            }
        }
    }

    async fn output(&self, run_name: &str, outcome: RunOutcome) -> RunOutput {
        let logs = match self.read_logs(run_name).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(run_name, error = %e, "Could not retrieve job logs");
                format!("Could not retrieve logs. Kubernetes API Error: {}", e.reason)
            }
        };

        RunOutput {
            run_name: run_name.to_string(),
            outcome,
            logs,
        }
    }

    /// Logs of every pod the Job created, oldest first.
    ///
    /// A Job with retries left may have started several pods; each gets a
    /// header so the attempts stay distinguishable.
    async fn read_logs(&self, run_name: &str) -> Result<String, PlatformError> {
        let mut surfaces = self
            .platform
            .list_surfaces(&self.namespace, run_name)
            .await?;

        if surfaces.is_empty() {
            return Ok(NO_POD_MESSAGE.to_string());
        }
        surfaces.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });

        if let [only] = surfaces.as_slice() {
            return Ok(self.read_log(only).await?.trim().to_string());
        }

        let mut sections = Vec::with_capacity(surfaces.len());
        for surface in &surfaces {
            let log = self.read_log(surface).await?;
            sections.push(format!("--- pod {} ---\n{}", surface.name, log.trim()));
        }
        Ok(sections.join("\n").trim().to_string())
    }

    async fn read_log(&self, surface: &ExecutionSurface) -> Result<String, PlatformError> {
        self.platform
            .read_surface_log(&self.namespace, &surface.name)
            .await
    }
}
