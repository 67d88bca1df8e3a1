// ABOUTME: Kubernetes platform implementation backed by ConfigMaps, Jobs, and Pods
// ABOUTME: Uses the kube client to stage payloads, submit Jobs, poll status, and read pod logs

use super::{ExecutionSurface, PayloadSpec, Platform, PlatformError, Result, RunPhase, RunSpec};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::{debug, info};

/// Label Kubernetes puts on every pod created by a Job
const JOB_NAME_LABEL: &str = "job-name";

pub struct KubePlatform {
    client: Client,
}

impl KubePlatform {
    /// Connect using the ambient kubeconfig, falling back to in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| PlatformError::transport(format!("failed to build client: {}", e)))?;

        info!("Connected to Kubernetes API server");
        Ok(Self { client })
    }

    /// Create with an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Convert a kube client error into our platform error
fn convert_error(err: kube::Error) -> PlatformError {
    match err {
        kube::Error::Api(response) => {
            let reason = if response.message.is_empty() {
                response.reason
            } else {
                response.message
            };
            PlatformError::new(response.code, reason)
        }
        other => PlatformError::transport(other.to_string()),
    }
}

fn build_config_map(payload: &PayloadSpec) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(payload.name.clone()),
            labels: Some(payload.labels.clone()),
            ..Default::default()
        },
        data: Some(payload.data.clone()),
        ..Default::default()
    }
}

/// Render a run description as a batch/v1 Job manifest
fn build_job(run: &RunSpec) -> Result<Job> {
    let mut container = json!({
        "name": run.name,
        "image": run.image,
        "command": run.command,
        "securityContext": {
            "runAsUser": run.security.run_as_user,
            "runAsNonRoot": run.security.run_as_non_root,
            "allowPrivilegeEscalation": run.security.allow_privilege_escalation,
        },
        "volumeMounts": [{
            "name": run.mount.volume_name,
            "mountPath": run.mount.mount_path,
            "readOnly": true,
        }],
    });

    if let Some(policy) = &run.image_pull_policy {
        container["imagePullPolicy"] = json!(policy);
    }
    if !run.env.is_empty() {
        container["env"] = run
            .env
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
    }

    let manifest = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": run.name,
            "labels": run.labels,
        },
        "spec": {
            "backoffLimit": run.backoff_limit,
            "ttlSecondsAfterFinished": run.ttl_seconds_after_finished,
            "template": {
                "metadata": { "labels": run.pod_labels },
                "spec": {
                    "restartPolicy": run.restart_policy,
                    "containers": [container],
                    "volumes": [{
                        "name": run.mount.volume_name,
                        "configMap": { "name": run.mount.payload_name },
                    }],
                },
            },
        },
    });

    serde_json::from_value(manifest)
        .map_err(|e| PlatformError::transport(format!("invalid job manifest: {}", e)))
}

/// Derive the run phase from a Job's status block.
///
/// Terminal conditions win over counters: with a backoff budget a Job can
/// report failed pods while still retrying, and only the `Failed` condition
/// means the platform gave up.
fn job_phase(job: &Job) -> RunPhase {
    let Some(status) = job.status.as_ref() else {
        return RunPhase::Pending;
    };

    if let Some(conditions) = &status.conditions {
        for condition in conditions.iter().filter(|c| c.status == "True") {
            match condition.type_.as_str() {
                "Complete" => return RunPhase::Succeeded,
                "Failed" => return RunPhase::Failed,
                _ => {}
            }
        }
    }

    if status.succeeded.unwrap_or(0) > 0 {
        RunPhase::Succeeded
    } else if status.active.unwrap_or(0) > 0 {
        RunPhase::Running
    } else {
        RunPhase::Pending
    }
}

fn object_names(items: impl IntoIterator<Item = ObjectMeta>) -> Vec<String> {
    items.into_iter().filter_map(|meta| meta.name).collect()
}

#[async_trait]
impl Platform for KubePlatform {
    async fn create_payload(&self, namespace: &str, payload: &PayloadSpec) -> Result<()> {
        debug!(namespace, name = %payload.name, "Creating ConfigMap");

        self.config_maps(namespace)
            .create(&PostParams::default(), &build_config_map(payload))
            .await
            .map_err(convert_error)?;

        Ok(())
    }

    async fn delete_payload(&self, namespace: &str, name: &str) -> Result<()> {
        debug!(namespace, name, "Deleting ConfigMap");

        self.config_maps(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(convert_error)?;

        Ok(())
    }

    async fn list_payloads(&self, namespace: &str) -> Result<Vec<String>> {
        let list = self
            .config_maps(namespace)
            .list(&ListParams::default())
            .await
            .map_err(convert_error)?;

        Ok(object_names(list.items.into_iter().map(|cm| cm.metadata)))
    }

    async fn create_run(&self, namespace: &str, run: &RunSpec) -> Result<()> {
        debug!(namespace, name = %run.name, image = %run.image, "Creating Job");

        let job = build_job(run)?;
        self.jobs(namespace)
            .create(&PostParams::default(), &job)
            .await
            .map_err(convert_error)?;

        Ok(())
    }

    async fn read_run_phase(&self, namespace: &str, name: &str) -> Result<RunPhase> {
        let job = self
            .jobs(namespace)
            .get_status(name)
            .await
            .map_err(convert_error)?;

        Ok(job_phase(&job))
    }

    async fn delete_run(&self, namespace: &str, name: &str) -> Result<()> {
        debug!(namespace, name, "Deleting Job (foreground propagation)");

        self.jobs(namespace)
            .delete(name, &DeleteParams::foreground())
            .await
            .map_err(convert_error)?;

        Ok(())
    }

    async fn list_runs(&self, namespace: &str) -> Result<Vec<String>> {
        let list = self
            .jobs(namespace)
            .list(&ListParams::default())
            .await
            .map_err(convert_error)?;

        Ok(object_names(list.items.into_iter().map(|job| job.metadata)))
    }

    async fn list_surfaces(
        &self,
        namespace: &str,
        run_name: &str,
    ) -> Result<Vec<ExecutionSurface>> {
        let selector = format!("{}={}", JOB_NAME_LABEL, run_name);
        let list = self
            .pods(namespace)
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(convert_error)?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|pod| {
                let created_at = pod.metadata.creation_timestamp.map(|ts| ts.0);
                pod.metadata
                    .name
                    .map(|name| ExecutionSurface { name, created_at })
            })
            .collect())
    }

    async fn read_surface_log(&self, namespace: &str, surface_name: &str) -> Result<String> {
        self.pods(namespace)
            .logs(surface_name, &LogParams::default())
            .await
            .map_err(convert_error)
    }
}
