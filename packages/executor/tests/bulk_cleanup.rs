// ABOUTME: Integration tests for sweeping leaked Jobs and ConfigMaps by name prefix
// ABOUTME: Verifies prefix scoping, namespace scoping, dry runs, and error collection

use kubexec_executor::{CleanupError, ExecutionConfig, ExecutionManager, FakePlatform, PlatformError};
use std::sync::Arc;

fn seeded() -> Arc<FakePlatform> {
    let fake = Arc::new(FakePlatform::new());
    for id in ["aaaa1111", "bbbb2222"] {
        fake.seed_run("default", &format!("code-runner-job-{}", id));
        fake.seed_payload("default", &format!("code-runner-configmap-{}", id));
    }
    fake.seed_run("default", "nightly-report");
    fake.seed_payload("default", "kube-root-ca.crt");
    fake.seed_run("other", "code-runner-job-cccc3333");
    fake
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[tokio::test]
async fn test_sweep_removes_only_prefixed_resources() {
    let fake = seeded();
    let manager = ExecutionManager::new(fake.clone(), ExecutionConfig::default());

    let summary = manager.reap_all_by_prefix("code-runner", false).await.unwrap();

    assert_eq!(summary.removed_runs, 2);
    assert_eq!(summary.removed_payloads, 2);
    assert!(summary.errors.is_empty());
    assert_eq!(
        sorted(fake.run_names()),
        vec!["code-runner-job-cccc3333", "nightly-report"]
    );
    assert_eq!(fake.payload_names(), vec!["kube-root-ca.crt"]);
}

#[tokio::test]
async fn test_dry_run_lists_without_deleting() {
    let fake = seeded();
    let manager = ExecutionManager::new(fake.clone(), ExecutionConfig::default());

    let summary = manager.reap_all_by_prefix("code-runner", true).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(
        sorted(summary.matched_runs.clone()),
        vec!["code-runner-job-aaaa1111", "code-runner-job-bbbb2222"]
    );
    assert_eq!(summary.matched_payloads.len(), 2);
    assert_eq!(summary.removed_runs, 0);
    assert_eq!(fake.delete_run_calls(), 0);
    assert_eq!(fake.run_names().len(), 4);
}

#[tokio::test]
async fn test_delete_errors_are_collected() {
    let fake = Arc::new(
        FakePlatform::new().fail_delete_payload(PlatformError::new(403, "Forbidden")),
    );
    fake.seed_run("default", "code-runner-job-aaaa1111");
    fake.seed_payload("default", "code-runner-configmap-aaaa1111");
    let manager = ExecutionManager::new(fake.clone(), ExecutionConfig::default());

    let summary = manager.reap_all_by_prefix("code-runner", false).await.unwrap();

    assert_eq!(summary.removed_runs, 1);
    assert_eq!(summary.removed_payloads, 0);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("code-runner-configmap-aaaa1111"));
}

#[tokio::test]
async fn test_listing_failure_is_an_error() {
    let fake = Arc::new(FakePlatform::new().fail_list(PlatformError::transport("connection refused")));
    let manager = ExecutionManager::new(fake, ExecutionConfig::default());

    let err = manager
        .reap_all_by_prefix("code-runner", false)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CleanupError::Platform(PlatformError::transport("connection refused"))
    );
}

#[tokio::test]
async fn test_empty_prefix_is_refused_and_nothing_deleted() {
    let fake = seeded();
    let manager = ExecutionManager::new(fake.clone(), ExecutionConfig::default());

    let err = manager.reap_all_by_prefix("", false).await.unwrap_err();

    assert!(matches!(err, CleanupError::InvalidPrefix(_)));
    assert_eq!(fake.delete_run_calls(), 0);
    assert_eq!(fake.delete_payload_calls(), 0);
    assert_eq!(fake.run_names().len(), 4);
    assert_eq!(fake.payload_names().len(), 3);
}

#[tokio::test]
async fn test_malformed_prefix_is_refused() {
    let fake = seeded();
    let manager = ExecutionManager::new(fake.clone(), ExecutionConfig::default());

    for prefix in ["-", "Code-Runner", "kube root"] {
        let err = manager.reap_all_by_prefix(prefix, true).await.unwrap_err();
        assert!(matches!(err, CleanupError::InvalidPrefix(_)), "{prefix}");
    }
    assert_eq!(fake.run_names().len(), 4);
}
