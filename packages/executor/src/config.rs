// ABOUTME: Process-wide execution settings shared by every run of a manager
// ABOUTME: Loads namespace, image, timeout, and pull policy from KUBEXEC_* environment variables

use crate::error::ConfigError;
use kubexec_config::{
    read_var, DEFAULT_IMAGE, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT_SECS, KUBEXEC_IMAGE,
    KUBEXEC_IMAGE_PULL_POLICY, KUBEXEC_NAMESPACE, KUBEXEC_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Maximum length of a Kubernetes object name used as a label value
pub const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImagePullPolicy {
    Always,
    IfNotPresent,
    Never,
}

impl ImagePullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "Always",
            ImagePullPolicy::IfNotPresent => "IfNotPresent",
            ImagePullPolicy::Never => "Never",
        }
    }
}

impl FromStr for ImagePullPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Always" => Ok(ImagePullPolicy::Always),
            "IfNotPresent" => Ok(ImagePullPolicy::IfNotPresent),
            "Never" => Ok(ImagePullPolicy::Never),
            _ => Err(ConfigError::InvalidPullPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ImagePullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings fixed when the manager is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionConfig {
    pub namespace: String,
    /// Must ship a `python3` interpreter (and `pip3` when dependencies are used)
    pub image: String,
    pub timeout_seconds: u64,
    /// Unset leaves the cluster default in place
    pub image_pull_policy: Option<ImagePullPolicy>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            image_pull_policy: None,
        }
    }
}

impl ExecutionConfig {
    /// Build from `KUBEXEC_*` environment variables, defaulting what is unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(read_var)
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(namespace) = lookup(KUBEXEC_NAMESPACE) {
            config.namespace = namespace;
        }
        if let Some(image) = lookup(KUBEXEC_IMAGE) {
            config.image = image;
        }
        if let Some(raw) = lookup(KUBEXEC_TIMEOUT_SECS) {
            config.timeout_seconds = parse_timeout(&raw)?;
        }
        if let Some(raw) = lookup(KUBEXEC_IMAGE_PULL_POLICY) {
            config.image_pull_policy = Some(raw.parse()?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_image_pull_policy(mut self, policy: ImagePullPolicy) -> Self {
        self.image_pull_policy = Some(policy);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::Missing("namespace".to_string()));
        }
        if !is_dns_label(&self.namespace) {
            return Err(ConfigError::InvalidNamespace(self.namespace.clone()));
        }
        if self.image.trim().is_empty() {
            return Err(ConfigError::Missing("image".to_string()));
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds.to_string()));
        }
        Ok(())
    }
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .ok()
        .filter(|secs| (1..=MAX_TIMEOUT_SECS).contains(secs))
        .ok_or_else(|| ConfigError::InvalidTimeout(raw.to_string()))
}

/// RFC 1123 label: lowercase alphanumerics and '-', alphanumeric at both ends
pub(crate) fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LEN
        && bytes.first().is_some_and(edge_ok)
        && bytes.last().is_some_and(edge_ok)
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ExecutionConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ExecutionConfig::default());
        assert_eq!(config.namespace, "default");
        assert_eq!(config.image, "python:3.12-slim");
        assert_eq!(config.timeout_seconds, 300);
        assert_eq!(config.image_pull_policy, None);
    }

    #[test]
    fn test_values_from_environment() {
        let config = ExecutionConfig::from_lookup(lookup_from(&[
            (KUBEXEC_NAMESPACE, "sandbox"),
            (KUBEXEC_IMAGE, "code-runner:latest"),
            (KUBEXEC_TIMEOUT_SECS, "60"),
            (KUBEXEC_IMAGE_PULL_POLICY, "Never"),
        ]))
        .unwrap();

        assert_eq!(config.namespace, "sandbox");
        assert_eq!(config.image, "code-runner:latest");
        assert_eq!(config.timeout_seconds, 60);
        assert_eq!(config.image_pull_policy, Some(ImagePullPolicy::Never));
    }

    #[rstest]
    #[case("0")]
    #[case("-5")]
    #[case("ten")]
    #[case("86401")]
    fn test_invalid_timeout_rejected(#[case] raw: &str) {
        let err =
            ExecutionConfig::from_lookup(lookup_from(&[(KUBEXEC_TIMEOUT_SECS, raw)])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout(raw.to_string()));
    }

    #[test]
    fn test_invalid_pull_policy_rejected() {
        let err = ExecutionConfig::from_lookup(lookup_from(&[(KUBEXEC_IMAGE_PULL_POLICY, "never")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPullPolicy("never".to_string()));
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let err = ExecutionConfig::from_lookup(lookup_from(&[(KUBEXEC_NAMESPACE, "My_Space")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidNamespace("My_Space".to_string()));
    }

    #[test]
    fn test_builder_overrides_validate() {
        let config = ExecutionConfig::default()
            .with_namespace("jobs")
            .with_timeout_seconds(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));

        let config = ExecutionConfig::default().with_image("  ");
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("image".to_string()))
        );
    }

    #[rstest]
    #[case("default", true)]
    #[case("code-runner", true)]
    #[case("a1", true)]
    #[case("", false)]
    #[case("-leading", false)]
    #[case("trailing-", false)]
    #[case("Upper", false)]
    #[case("under_score", false)]
    fn test_dns_label(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_dns_label(value), expected);
    }

    #[test]
    fn test_dns_label_length_limit() {
        assert!(is_dns_label(&"a".repeat(63)));
        assert!(!is_dns_label(&"a".repeat(64)));
    }
}
