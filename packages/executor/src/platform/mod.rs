// ABOUTME: Platform trait and resource descriptions for cluster execution backends
// ABOUTME: Defines the abstract interface for payload, run, and execution surface lifecycle

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod kubernetes;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use kubernetes::KubePlatform;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakePlatform;

/// Failed call to the cluster API.
///
/// `status` mirrors the HTTP status returned by the API server when there was
/// one; transport failures (connection refused, TLS) carry `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Kubernetes API error (status {}): {reason}", status_label(.status))]
pub struct PlatformError {
    pub status: Option<u16>,
    pub reason: String,
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl PlatformError {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reason: reason.into(),
        }
    }

    /// Error without an HTTP status (transport or decoding failure)
    pub fn transport(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            reason: reason.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(404, format!("\"{}\" not found", name))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Status rendered for human-readable reports
    pub fn status_text(&self) -> String {
        status_label(&self.status)
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Named object holding the code to run
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadSpec {
    pub name: String,
    pub data: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// Security context applied to the run container
#[derive(Debug, Clone, PartialEq)]
pub struct RunSecurity {
    pub run_as_user: i64,
    pub run_as_non_root: bool,
    pub allow_privilege_escalation: bool,
}

/// Read-only mount exposing a payload inside the run container
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadMount {
    pub volume_name: String,
    pub payload_name: String,
    pub mount_path: String,
}

/// Execution unit description handed to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub image_pull_policy: Option<String>,
    pub command: Vec<String>,
    /// Container environment variables
    pub env: BTreeMap<String, String>,
    pub mount: PayloadMount,
    pub security: RunSecurity,
    /// Pod restart policy; runs are fire-once so this is always "Never"
    pub restart_policy: String,
    /// Additional attempts the platform makes before marking the run failed
    pub backoff_limit: i32,
    /// Platform-side garbage collection hint once the run finishes
    pub ttl_seconds_after_finished: i32,
    pub labels: BTreeMap<String, String>,
    pub pod_labels: BTreeMap<String, String>,
}

/// Cluster-assigned phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// Concrete instance (pod) backing a run, from which logs are read
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSurface {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Cluster API consumed by the execution manager.
///
/// All operations are scoped to a namespace. Implementations must report a
/// missing object as a `PlatformError` with status 404 so callers can tell
/// "already absent" apart from real failures.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a payload object
    async fn create_payload(&self, namespace: &str, payload: &PayloadSpec) -> Result<()>;

    /// Delete a payload object
    async fn delete_payload(&self, namespace: &str, name: &str) -> Result<()>;

    /// Names of all payload objects in the namespace
    async fn list_payloads(&self, namespace: &str) -> Result<Vec<String>>;

    /// Submit a run; returns once the platform accepted it
    async fn create_run(&self, namespace: &str, run: &RunSpec) -> Result<()>;

    /// Current phase of a run
    async fn read_run_phase(&self, namespace: &str, name: &str) -> Result<RunPhase>;

    /// Delete a run together with its dependents
    async fn delete_run(&self, namespace: &str, name: &str) -> Result<()>;

    /// Names of all runs in the namespace
    async fn list_runs(&self, namespace: &str) -> Result<Vec<String>>;

    /// Execution surfaces created for a run
    async fn list_surfaces(&self, namespace: &str, run_name: &str)
        -> Result<Vec<ExecutionSurface>>;

    /// Captured stdout/stderr of one surface
    async fn read_surface_log(&self, namespace: &str, surface_name: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(PlatformError::not_found("demo").is_not_found());
        assert!(!PlatformError::new(500, "boom").is_not_found());
        assert!(!PlatformError::transport("connection refused").is_not_found());
    }

    #[test]
    fn test_error_display_includes_status() {
        let err = PlatformError::new(403, "forbidden");
        assert_eq!(err.to_string(), "Kubernetes API error (status 403): forbidden");

        let err = PlatformError::transport("connection refused");
        assert_eq!(
            err.to_string(),
            "Kubernetes API error (status unknown): connection refused"
        );
    }

    #[test]
    fn test_terminal_phases() {
        assert!(RunPhase::Succeeded.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(!RunPhase::Pending.is_terminal());
        assert!(!RunPhase::Running.is_terminal());
    }
}
