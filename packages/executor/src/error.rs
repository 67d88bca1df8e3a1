// ABOUTME: Error types for payload staging, run launching, completion watching, and configuration
// ABOUTME: Maps every failure of a run onto the human-readable strings returned to tool callers

use crate::platform::PlatformError;
use thiserror::Error;

/// Failure while waiting for a run to finish
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Job '{run_name}' did not complete within {timeout_seconds} seconds")]
    Timeout {
        run_name: String,
        timeout_seconds: u64,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Failure of a whole run.
///
/// A run whose code exits non-zero is not an error; it comes back as
/// `RunOutcome::Failed` inside the output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Failed to stage payload: {0}")]
    Stage(PlatformError),

    #[error("Failed to launch job: {0}")]
    Launch(PlatformError),

    #[error("Job '{run_name}' did not complete within {timeout_seconds} seconds")]
    Timeout {
        run_name: String,
        timeout_seconds: u64,
    },

    #[error("Failed while waiting for job: {0}")]
    Watch(PlatformError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<WatchError> for ExecutionError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::Timeout {
                run_name,
                timeout_seconds,
            } => ExecutionError::Timeout {
                run_name,
                timeout_seconds,
            },
            WatchError::Platform(e) => ExecutionError::Watch(e),
        }
    }
}

impl ExecutionError {
    /// Underlying cluster error, if this failure came from the API server
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            ExecutionError::Stage(e) | ExecutionError::Launch(e) | ExecutionError::Watch(e) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Text handed back to callers that only deal in strings
    pub fn user_message(&self) -> String {
        match self {
            ExecutionError::Timeout {
                run_name,
                timeout_seconds,
            } => format!(
                "Error: Job '{}' did not complete within {} seconds.",
                run_name, timeout_seconds
            ),
            ExecutionError::InvalidRequest(detail) => {
                format!("Error: Invalid request: {}", detail)
            }
            ExecutionError::Stage(e) | ExecutionError::Launch(e) | ExecutionError::Watch(e) => {
                format!(
                    "Error: A Kubernetes API error occurred. Status: {}, Reason: {}",
                    e.status_text(),
                    e.reason
                )
            }
        }
    }
}

/// Failure of a prefix sweep as a whole; per-resource deletion failures are
/// collected in the summary instead
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanupError {
    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl CleanupError {
    pub fn user_message(&self) -> String {
        match self {
            CleanupError::InvalidPrefix(detail) => format!("Error: Invalid request: {}", detail),
            CleanupError::Platform(e) => format!(
                "Error: A Kubernetes API error occurred. Status: {}, Reason: {}",
                e.status_text(),
                e.reason
            ),
        }
    }
}

/// Invalid configuration or unusable cluster client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid timeout '{0}': expected whole seconds between 1 and {max}", max = kubexec_config::MAX_TIMEOUT_SECS)]
    InvalidTimeout(String),

    #[error("Invalid namespace '{0}': must be a lowercase DNS-1123 label")]
    InvalidNamespace(String),

    #[error("Invalid image pull policy '{0}': expected Always, IfNotPresent, or Never")]
    InvalidPullPolicy(String),

    #[error("Failed to create Kubernetes client: {0}")]
    Client(String),
}
