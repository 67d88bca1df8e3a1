// ABOUTME: Payload stager that persists submitted code as a ConfigMap
// ABOUTME: The payload is mounted read-only into the run container under a fixed file name

use crate::platform::{PayloadSpec, Platform, PlatformError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Key under which the code is stored, and file name inside the mount
pub const SCRIPT_KEY: &str = "script.py";

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "kubexec";

pub(crate) fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())])
}

pub struct PayloadStager {
    platform: Arc<dyn Platform>,
    namespace: String,
}

impl PayloadStager {
    pub fn new(platform: Arc<dyn Platform>, namespace: impl Into<String>) -> Self {
        Self {
            platform,
            namespace: namespace.into(),
        }
    }

    /// Store `code` as a payload named `name`.
    ///
    /// No size check happens here; the API server rejects objects over its
    /// limit and that rejection comes back as the error.
    pub async fn stage(&self, name: &str, code: &str) -> Result<(), PlatformError> {
        debug!(payload = name, bytes = code.len(), "Staging payload");

        let payload = PayloadSpec {
            name: name.to_string(),
            data: BTreeMap::from([(SCRIPT_KEY.to_string(), code.to_string())]),
            labels: managed_labels(),
        };
        self.platform.create_payload(&self.namespace, &payload).await?;

        info!(payload = name, namespace = %self.namespace, "Payload staged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FakePlatform;

    #[tokio::test]
    async fn test_stage_stores_code_under_script_key() {
        let fake = Arc::new(FakePlatform::new());
        let stager = PayloadStager::new(fake.clone(), "default");

        stager
            .stage("code-runner-configmap-x1", "print('hello')")
            .await
            .unwrap();

        let payloads = fake.created_payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(
            payloads[0].data.get(SCRIPT_KEY).map(String::as_str),
            Some("print('hello')")
        );
        assert_eq!(
            payloads[0].labels.get(MANAGED_BY_LABEL).map(String::as_str),
            Some(MANAGED_BY_VALUE)
        );
    }

    #[tokio::test]
    async fn test_stage_propagates_platform_error() {
        let fake = Arc::new(
            FakePlatform::new().fail_create_payload(PlatformError::new(413, "Request entity too large")),
        );
        let stager = PayloadStager::new(fake.clone(), "default");

        let err = stager.stage("cm", "x").await.unwrap_err();
        assert_eq!(err.status, Some(413));
        assert!(fake.payload_names().is_empty());
    }
}
