// ABOUTME: Run launcher that submits a restart-disabled Job executing the staged payload
// ABOUTME: Chooses between a direct interpreter call and a pip install followed by exec

use crate::config::ExecutionConfig;
use crate::platform::{PayloadMount, Platform, PlatformError, RunSecurity, RunSpec};
use crate::stager::{managed_labels, SCRIPT_KEY};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const VOLUME_NAME: &str = "code-volume";
pub const MOUNT_PATH: &str = "/app";

const BACKOFF_LIMIT: i32 = 2;
const TTL_SECONDS_AFTER_FINISHED: i32 = 60;
const RUN_AS_USER: i64 = 1001;

/// The run user has no passwd entry in stock images, which leaves HOME at `/`
/// where `pip install --user` cannot write
const RUN_HOME: &str = "/tmp";

fn script_path() -> String {
    format!("{}/{}", MOUNT_PATH, SCRIPT_KEY)
}

/// Quote a dependency for `bash -c` when it contains anything beyond the
/// characters pip requirement specifiers normally use.
pub fn shell_quote(word: &str) -> String {
    let plain = |c: char| c.is_ascii_alphanumeric() || "._+=<>!~-[],:/@".contains(c);

    if !word.is_empty() && word.chars().all(plain) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Container entry command for the given dependencies
pub fn entry_command(dependencies: &[String]) -> Vec<String> {
    if dependencies.is_empty() {
        return vec!["python3".to_string(), "-u".to_string(), script_path()];
    }

    let packages = dependencies
        .iter()
        .map(|dep| shell_quote(dep))
        .collect::<Vec<_>>()
        .join(" ");

    vec![
        "/bin/bash".to_string(),
        "-c".to_string(),
        format!(
            "pip3 install --no-cache-dir --user {} && exec python3 -u {}",
            packages,
            script_path()
        ),
    ]
}

pub struct RunLauncher {
    platform: Arc<dyn Platform>,
    config: ExecutionConfig,
}

impl RunLauncher {
    pub fn new(platform: Arc<dyn Platform>, config: ExecutionConfig) -> Self {
        Self { platform, config }
    }

    /// Describe the Job that executes `payload_name`
    pub fn run_spec(&self, run_name: &str, payload_name: &str, dependencies: &[String]) -> RunSpec {
        RunSpec {
            name: run_name.to_string(),
            image: self.config.image.clone(),
            image_pull_policy: self
                .config
                .image_pull_policy
                .map(|policy| policy.as_str().to_string()),
            command: entry_command(dependencies),
            env: BTreeMap::from([("HOME".to_string(), RUN_HOME.to_string())]),
            mount: PayloadMount {
                volume_name: VOLUME_NAME.to_string(),
                payload_name: payload_name.to_string(),
                mount_path: MOUNT_PATH.to_string(),
            },
            security: RunSecurity {
                run_as_user: RUN_AS_USER,
                run_as_non_root: true,
                allow_privilege_escalation: false,
            },
            restart_policy: "Never".to_string(),
            backoff_limit: BACKOFF_LIMIT,
            ttl_seconds_after_finished: TTL_SECONDS_AFTER_FINISHED,
            labels: managed_labels(),
            pod_labels: BTreeMap::from([("app".to_string(), run_name.to_string())]),
        }
    }

    /// Submit the run; returns as soon as the API server accepts it
    pub async fn launch(
        &self,
        run_name: &str,
        payload_name: &str,
        dependencies: &[String],
    ) -> Result<(), PlatformError> {
        let spec = self.run_spec(run_name, payload_name, dependencies);
        debug!(run_name, command = ?spec.command, "Launching job");

        self.platform.create_run(&self.config.namespace, &spec).await?;

        info!(
            run_name,
            namespace = %self.config.namespace,
            dependencies = dependencies.len(),
            "Job created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImagePullPolicy;
    use crate::platform::FakePlatform;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn deps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_dependencies_runs_interpreter_directly() {
        assert_eq!(
            entry_command(&[]),
            vec!["python3", "-u", "/app/script.py"]
        );
    }

    #[test]
    fn test_dependencies_installed_before_exec() {
        let command = entry_command(&deps(&["numpy"]));
        assert_eq!(command[0], "/bin/bash");
        assert_eq!(command[1], "-c");
        assert_eq!(
            command[2],
            "pip3 install --no-cache-dir --user numpy && exec python3 -u /app/script.py"
        );
    }

    #[test]
    fn test_multiple_dependencies_space_joined() {
        let command = entry_command(&deps(&["pandas==2.2.0", "requests[socks]>=2"]));
        assert_eq!(
            command[2],
            "pip3 install --no-cache-dir --user pandas==2.2.0 requests[socks]>=2 && exec python3 -u /app/script.py"
        );
    }

    #[rstest]
    #[case("numpy", "numpy")]
    #[case("scikit-learn", "scikit-learn")]
    #[case("numpy; rm -rf /", "'numpy; rm -rf /'")]
    #[case("a'b", r"'a'\''b'")]
    #[case("$(whoami)", "'$(whoami)'")]
    #[case("", "''")]
    fn test_shell_quote(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(shell_quote(input), expected);
    }

    #[test]
    fn test_run_spec_fixed_policy() {
        let launcher = RunLauncher::new(
            Arc::new(FakePlatform::new()),
            ExecutionConfig::default().with_image_pull_policy(ImagePullPolicy::Never),
        );
        let spec = launcher.run_spec("code-runner-job-abc", "code-runner-configmap-abc", &[]);

        assert_eq!(spec.restart_policy, "Never");
        assert_eq!(spec.backoff_limit, 2);
        assert_eq!(spec.ttl_seconds_after_finished, 60);
        assert_eq!(spec.security.run_as_user, 1001);
        assert!(spec.security.run_as_non_root);
        assert!(!spec.security.allow_privilege_escalation);
        assert_eq!(spec.mount.payload_name, "code-runner-configmap-abc");
        assert_eq!(spec.mount.mount_path, "/app");
        assert_eq!(spec.image_pull_policy.as_deref(), Some("Never"));
        assert_eq!(spec.env.get("HOME").map(String::as_str), Some("/tmp"));
        assert_eq!(
            spec.pod_labels.get("app").map(String::as_str),
            Some("code-runner-job-abc")
        );
    }

    #[tokio::test]
    async fn test_launch_submits_run() {
        let fake = Arc::new(FakePlatform::new());
        let launcher = RunLauncher::new(fake.clone(), ExecutionConfig::default());

        launcher
            .launch("job-1", "cm-1", &deps(&["numpy"]))
            .await
            .unwrap();

        assert_eq!(fake.run_names(), vec!["job-1".to_string()]);
        assert_eq!(fake.created_runs()[0].image, "python:3.12-slim");
    }
}
