// ABOUTME: Execution manager sequencing stage, launch, and watch with guaranteed cleanup
// ABOUTME: Generates run identities, validates prefixes, and renders results for string-only callers

use crate::config::{is_dns_label, ExecutionConfig, MAX_NAME_LEN};
use crate::error::{CleanupError, ConfigError, ExecutionError};
use crate::launcher::RunLauncher;
use crate::platform::{KubePlatform, Platform};
use crate::reaper::{ReapReport, ReapSummary, Removal, ResourceReaper};
use crate::stager::PayloadStager;
use crate::watcher::{CompletionWatcher, RunOutput};
use kubexec_config::DEFAULT_NAME_PREFIX;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Alphabet for run ids; lowercase so derived names stay valid DNS labels
const RUN_ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub const RUN_ID_LEN: usize = 8;

/// Longest infix inserted between prefix and run id
const LONGEST_INFIX: &str = "-configmap-";

pub fn generate_run_id() -> String {
    nanoid::nanoid!(RUN_ID_LEN, &RUN_ID_ALPHABET)
}

/// One code execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub code: String,
    pub dependencies: Vec<String>,
    pub name_prefix: String,
}

impl RunRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            dependencies: Vec::new(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}

/// Names of the resources belonging to one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNames {
    pub run_id: String,
    pub run_name: String,
    pub payload_name: String,
}

impl RunNames {
    pub fn new(prefix: &str, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            run_name: format!("{}-job-{}", prefix, run_id),
            payload_name: format!("{}-configmap-{}", prefix, run_id),
        }
    }
}

/// Reject prefixes that would produce names the API server refuses
pub fn validate_prefix(prefix: &str) -> Result<(), ExecutionError> {
    prefix_problem(prefix).map_or(Ok(()), |detail| Err(ExecutionError::InvalidRequest(detail)))
}

/// Why `prefix` cannot name a run's resources, if it cannot
pub(crate) fn prefix_problem(prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some("name prefix must not be empty".to_string());
    }

    let max_prefix = MAX_NAME_LEN - LONGEST_INFIX.len() - RUN_ID_LEN;
    if prefix.len() > max_prefix {
        return Some(format!(
            "name prefix '{}' is longer than {} characters",
            prefix, max_prefix
        ));
    }

    // A '-' always follows the prefix, so a trailing hyphen is fine
    if !is_dns_label(&format!("{}x", prefix)) {
        return Some(format!(
            "name prefix '{}' must consist of lowercase alphanumerics or '-' and start with an alphanumeric",
            prefix
        ));
    }

    None
}

/// Reaps a run if the future driving it is dropped before it finishes
struct ReapGuard {
    reaper: ResourceReaper,
    names: RunNames,
    armed: bool,
}

impl ReapGuard {
    fn new(reaper: ResourceReaper, names: RunNames) -> Self {
        Self {
            reaper,
            names,
            armed: true,
        }
    }

    /// Move the reap onto its own task and disarm. Dropping the caller after
    /// this point neither interrupts the reap nor starts a second one.
    fn hand_off(mut self) -> JoinHandle<ReapReport> {
        self.armed = false;
        let reaper = self.reaper.clone();
        let RunNames {
            run_name,
            payload_name,
            ..
        } = self.names.clone();
        tokio::spawn(async move { reaper.reap(&run_name, &payload_name).await })
    }
}

impl Drop for ReapGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let RunNames {
            run_name,
            payload_name,
            ..
        } = self.names.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(run_name = %run_name, "Run cancelled, scheduling cleanup");
                let reaper = self.reaper.clone();
                handle.spawn(async move {
                    reaper.reap(&run_name, &payload_name).await;
                });
            }
            Err(_) => {
                error!(
                    run_name = %run_name,
                    payload_name = %payload_name,
                    "Run cancelled outside a runtime; resources were not cleaned up"
                );
            }
        }
    }
}

/// Runs code snippets as Kubernetes Jobs.
///
/// Cheap to share behind an `Arc`; concurrent runs never share state beyond
/// the platform handle, and each run's resources carry a unique id.
pub struct ExecutionManager {
    config: ExecutionConfig,
    stager: PayloadStager,
    launcher: RunLauncher,
    watcher: CompletionWatcher,
    reaper: ResourceReaper,
}

impl ExecutionManager {
    pub fn new(platform: Arc<dyn Platform>, config: ExecutionConfig) -> Self {
        Self {
            stager: PayloadStager::new(platform.clone(), config.namespace.clone()),
            launcher: RunLauncher::new(platform.clone(), config.clone()),
            watcher: CompletionWatcher::new(platform.clone(), config.namespace.clone()),
            reaper: ResourceReaper::new(platform, config.namespace.clone()),
            config,
        }
    }

    /// Validate `config` and connect to the cluster from the ambient kubeconfig
    pub async fn connect(config: ExecutionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let platform = KubePlatform::try_default()
            .await
            .map_err(|e| ConfigError::Client(e.reason))?;
        Ok(Self::new(Arc::new(platform), config))
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run code and return the output, a failure-annotated output, or an
    /// error description. Never fails.
    pub async fn run(&self, code: &str, dependencies: &[String], prefix: &str) -> String {
        let request = RunRequest::new(code)
            .with_dependencies(dependencies.to_vec())
            .with_prefix(prefix);

        match self.execute(&request).await {
            Ok(output) => output.render(),
            Err(e) => e.user_message(),
        }
    }

    /// Run code and return a typed result.
    ///
    /// Every run that gets past validation is reaped exactly once, whatever
    /// the outcome. If the returned future is dropped before the steps finish
    /// the cleanup is spawned onto the current runtime instead.
    pub async fn execute(&self, request: &RunRequest) -> Result<RunOutput, ExecutionError> {
        validate_prefix(&request.name_prefix)?;

        let names = RunNames::new(&request.name_prefix, &generate_run_id());
        info!(
            run_name = %names.run_name,
            namespace = %self.config.namespace,
            dependencies = request.dependencies.len(),
            "Starting run"
        );

        let guard = ReapGuard::new(self.reaper.clone(), names.clone());
        let result = self.drive(request, &names).await;
        let report = match guard.hand_off().await {
            Ok(report) => report,
            Err(e) => {
                let message = format!("Cleanup task did not complete: {}", e);
                error!(run_name = %names.run_name, "{}", message);
                ReapReport {
                    run: Removal::Failed,
                    payload: Removal::Failed,
                    errors: vec![message],
                }
            }
        };

        if !report.is_clean() {
            warn!(
                run_name = %names.run_name,
                errors = report.errors.len(),
                "Run finished with cleanup errors"
            );
        }
        if let Err(e) = &result {
            error!(run_name = %names.run_name, error = %e, "Run aborted");
        }

        result
    }

    async fn drive(
        &self,
        request: &RunRequest,
        names: &RunNames,
    ) -> Result<RunOutput, ExecutionError> {
        self.stager
            .stage(&names.payload_name, &request.code)
            .await
            .map_err(ExecutionError::Stage)?;

        self.launcher
            .launch(&names.run_name, &names.payload_name, &request.dependencies)
            .await
            .map_err(ExecutionError::Launch)?;

        let output = self
            .watcher
            .await_completion(&names.run_name, self.config.timeout_seconds)
            .await?;

        Ok(output)
    }

    /// Delete one run's resources
    pub async fn reap(&self, run_name: &str, payload_name: &str) -> ReapReport {
        self.reaper.reap(run_name, payload_name).await
    }

    /// Delete every run and payload whose name starts with `prefix`
    pub async fn reap_all_by_prefix(
        &self,
        prefix: &str,
        dry_run: bool,
    ) -> Result<ReapSummary, CleanupError> {
        self.reaper.reap_all_by_prefix(prefix, dry_run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_run_id_shape() {
        let id = generate_run_id();
        assert_eq!(id.len(), RUN_ID_LEN);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_run_ids_differ() {
        assert_ne!(generate_run_id(), generate_run_id());
    }

    #[test]
    fn test_names_share_run_id() {
        let names = RunNames::new("code-runner", "ab12cd34");
        assert_eq!(names.run_name, "code-runner-job-ab12cd34");
        assert_eq!(names.payload_name, "code-runner-configmap-ab12cd34");
    }

    #[rstest]
    #[case("code-runner")]
    #[case("a")]
    #[case("team-7")]
    #[case("x-")]
    fn test_valid_prefixes(#[case] prefix: &str) {
        assert!(validate_prefix(prefix).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("Code")]
    #[case("-lead")]
    #[case("has space")]
    #[case("under_score")]
    fn test_invalid_prefixes(#[case] prefix: &str) {
        assert!(matches!(
            validate_prefix(prefix),
            Err(ExecutionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_prefix_length_limit() {
        let longest = "a".repeat(MAX_NAME_LEN - LONGEST_INFIX.len() - RUN_ID_LEN);
        assert!(validate_prefix(&longest).is_ok());

        let names = RunNames::new(&longest, &generate_run_id());
        assert_eq!(names.payload_name.len(), MAX_NAME_LEN);

        let too_long = format!("{}a", longest);
        assert!(validate_prefix(&too_long).is_err());
    }

    #[test]
    fn test_request_defaults() {
        let request = RunRequest::new("print(1)");
        assert_eq!(request.name_prefix, "code-runner");
        assert!(request.dependencies.is_empty());
    }
}
