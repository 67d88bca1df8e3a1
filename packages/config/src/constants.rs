// ABOUTME: Environment variable name constants and defaults
// ABOUTME: Centralized definitions of all environment variable names used across Kubexec

// Cluster Placement
pub const KUBEXEC_NAMESPACE: &str = "KUBEXEC_NAMESPACE";

// Run Unit Configuration
pub const KUBEXEC_IMAGE: &str = "KUBEXEC_IMAGE";
pub const KUBEXEC_IMAGE_PULL_POLICY: &str = "KUBEXEC_IMAGE_PULL_POLICY";
pub const KUBEXEC_TIMEOUT_SECS: &str = "KUBEXEC_TIMEOUT_SECS";

// Resource Naming
pub const KUBEXEC_NAME_PREFIX: &str = "KUBEXEC_NAME_PREFIX";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";

// Defaults
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_IMAGE: &str = "python:3.12-slim";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_NAME_PREFIX: &str = "code-runner";

/// Upper bound accepted for `KUBEXEC_TIMEOUT_SECS` (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;
