// ABOUTME: Ephemeral code execution on Kubernetes with guaranteed cleanup
// ABOUTME: Stages code as a ConfigMap, runs it in a Job, collects pod logs, and reaps both

pub mod config;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod platform;
pub mod reaper;
pub mod stager;
pub mod watcher;

pub use config::{ExecutionConfig, ImagePullPolicy};
pub use error::{CleanupError, ConfigError, ExecutionError, WatchError};
pub use manager::{ExecutionManager, RunNames, RunRequest};
pub use platform::{KubePlatform, Platform, PlatformError};
pub use reaper::{ReapReport, ReapSummary, Removal};
pub use watcher::{RunOutcome, RunOutput};

#[cfg(any(test, feature = "test-utils"))]
pub use platform::FakePlatform;
