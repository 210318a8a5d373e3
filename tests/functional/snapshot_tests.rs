//! RedisSnapshot passes against the simulated control plane.
//!
//! Every test starts from a RedisCluster "bar" provisioned by the aws
//! strategy and a RedisSnapshot "bar-snap" created at 2024-01-01T12:00:00Z,
//! so the external snapshot name is always `bar-snap-default-20240101120000`.

use std::time::Duration;

use redis_cloud_operator::client::CloudError;
use redis_cloud_operator::controller::error::Error;
use redis_cloud_operator::controller::snapshot_reconciler::{
    MSG_CREATION_IN_PROGRESS, MSG_SNAPSHOT_CREATED,
};
use redis_cloud_operator::crd::{RedisSnapshot, RedisSnapshotStatus, SnapshotPhase};

use crate::mock_backends::{Harness, RedisClusterBuilder, RedisSnapshotBuilder};

const SNAPSHOT_NAME: &str = "bar-snap-default-20240101120000";
const RECHECK: Duration = Duration::from_secs(60);

/// Harness with a provisioned cluster "bar" whose group has the given status.
fn harness_with_group(status: &str) -> Harness {
    let harness = Harness::new();
    harness.store.insert_cluster(
        RedisClusterBuilder::new("bar")
            .with_finalizer()
            .strategy("aws")
            .build(),
    );
    harness.cloud.add_group(
        "bar",
        status,
        Some(("10.0.0.7", 6379)),
        &[("bar-001", "primary"), ("bar-002", "replica")],
    );
    harness
}

fn snapshot() -> RedisSnapshot {
    RedisSnapshotBuilder::new("bar-snap").cluster("bar").build()
}

#[tokio::test]
async fn test_snapshot_lifecycle() {
    let harness = harness_with_group("available");
    let mut snap = snapshot();

    // Pass 1: snapshot requested from the primary node
    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();
    assert_eq!(outcome.phase, SnapshotPhase::InProgress);
    assert_eq!(outcome.requeue_after, Some(RECHECK));
    assert_eq!(
        harness.cloud.state().create_snapshot_calls,
        vec![("bar-001".to_string(), SNAPSHOT_NAME.to_string())]
    );
    let status = snap.status.clone().unwrap();
    assert_eq!(status.message, MSG_CREATION_IN_PROGRESS);
    assert_eq!(status.snapshot_name.as_deref(), Some(SNAPSHOT_NAME));

    // Pass 2: group busy with our snapshot, snapshot still creating
    harness.cloud.set_group_status("bar", "snapshotting", None);
    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();
    assert_eq!(outcome.phase, SnapshotPhase::InProgress);
    assert_eq!(
        snap.status.as_ref().map(|s| s.message.as_str()),
        Some("current snapshot status : creating")
    );

    // Pass 3: snapshot available
    harness.cloud.set_group_status("bar", "available", None);
    harness.cloud.set_snapshot_status(SNAPSHOT_NAME, "available");
    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();
    assert_eq!(outcome.phase, SnapshotPhase::Complete);
    assert_eq!(outcome.requeue_after, None);
    assert_eq!(
        snap.status.as_ref().map(|s| s.message.as_str()),
        Some(MSG_SNAPSHOT_CREATED)
    );

    assert_eq!(harness.cloud.state().create_snapshot_calls.len(), 1);

    // Pass 4: complete snapshots are left alone
    let calls = harness.cloud.state().total_calls();
    let writes = harness.store.snapshot_status_writes();
    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();
    assert_eq!(outcome.phase, SnapshotPhase::Complete);
    assert_eq!(harness.cloud.state().total_calls(), calls);
    assert_eq!(harness.store.snapshot_status_writes(), writes);
}

#[tokio::test]
async fn test_complete_snapshot_makes_no_calls() {
    let harness = harness_with_group("available");
    let mut snap = RedisSnapshotBuilder::new("bar-snap")
        .phase(SnapshotPhase::Complete)
        .build();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Complete);
    assert_eq!(outcome.requeue_after, None);
    let state = harness.cloud.state();
    assert_eq!(state.total_calls(), 0);
    assert!(state.connects.is_empty());
    drop(state);
    assert_eq!(harness.store.snapshot_status_writes(), 0);
    assert!(harness.resolver.calls().is_empty());
}

#[tokio::test]
async fn test_busy_group_fails_snapshot() {
    let harness = harness_with_group("modifying");
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Failed);
    assert_eq!(outcome.requeue_after, Some(RECHECK));
    let status = snap.status.unwrap();
    assert_eq!(status.message, "current replication group status is modifying");
    assert!(harness.cloud.state().create_snapshot_calls.is_empty());
}

#[tokio::test]
async fn test_snapshotting_group_without_our_snapshot_fails() {
    let harness = harness_with_group("snapshotting");
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Failed);
    assert!(
        snap.status
            .unwrap()
            .message
            .contains("snapshotting")
    );
}

#[tokio::test]
async fn test_failed_snapshot_recovers() {
    let harness = harness_with_group("modifying");
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();
    assert_eq!(outcome.phase, SnapshotPhase::Failed);

    harness.cloud.set_group_status("bar", "available", None);
    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::InProgress);
    assert_eq!(harness.cloud.state().create_snapshot_calls.len(), 1);
}

#[tokio::test]
async fn test_missing_cluster_fails_with_long_recheck() {
    let harness = Harness::new();
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Failed);
    assert_eq!(outcome.requeue_after, Some(Duration::from_secs(300)));
    let status = snap.status.unwrap();
    assert!(status.message.starts_with("failed to get redis cluster bar"));
    assert!(status.message.contains("not found"));
    assert!(harness.cloud.state().connects.is_empty());
}

#[tokio::test]
async fn test_unsupported_strategy_is_rejected() {
    let harness = Harness::new();
    harness.store.insert_cluster(
        RedisClusterBuilder::new("bar")
            .with_finalizer()
            .strategy("openshift")
            .build(),
    );
    let mut snap = snapshot();

    let err = harness.reconcile_snapshot(&mut snap).await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedStrategy(_)));
    assert_eq!(snap.status.map(|s| s.phase), Some(SnapshotPhase::Failed));
    assert!(harness.cloud.state().connects.is_empty());
}

#[tokio::test]
async fn test_unprovisioned_cluster_is_rejected() {
    let harness = Harness::new();
    harness
        .store
        .insert_cluster(RedisClusterBuilder::new("bar").build());
    let mut snap = snapshot();

    let err = harness.reconcile_snapshot(&mut snap).await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedStrategy(_)));
    assert_eq!(snap.status.map(|s| s.phase), Some(SnapshotPhase::Failed));
}

#[tokio::test]
async fn test_missing_replication_group_fails() {
    let harness = harness_with_group("available");
    harness.cloud.remove_group("bar");
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Failed);
    assert_eq!(snap.status.unwrap().message, "replication group bar not found");
}

#[tokio::test]
async fn test_group_without_primary_fails() {
    let harness = Harness::new();
    harness.store.insert_cluster(
        RedisClusterBuilder::new("bar")
            .with_finalizer()
            .strategy("aws")
            .build(),
    );
    harness
        .cloud
        .add_group("bar", "available", None, &[("bar-002", "replica")]);
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Failed);
    assert_eq!(
        snap.status.unwrap().message,
        "no primary node found in replication group bar"
    );
    assert!(harness.cloud.state().create_snapshot_calls.is_empty());
}

#[tokio::test]
async fn test_snapshot_lookup_error_is_reported_as_failed() {
    let harness = harness_with_group("available");
    harness.cloud.state().describe_snapshots_error = Some(CloudError::new(
        "AccessDenied",
        "not authorized to perform elasticache:DescribeSnapshots",
    ));
    let mut snap = RedisSnapshotBuilder::new("bar-snap")
        .phase(SnapshotPhase::InProgress)
        .build();

    let err = harness.reconcile_snapshot(&mut snap).await.unwrap_err();

    assert!(matches!(err, Error::Cloud(_)));
    let status = snap.status.unwrap();
    assert_eq!(status.phase, SnapshotPhase::Failed);
    assert!(status.message.contains("elasticache:DescribeSnapshots"));
    assert!(harness.cloud.state().create_snapshot_calls.is_empty());
}

#[tokio::test]
async fn test_group_lookup_error_is_reported_as_failed() {
    let harness = harness_with_group("available");
    harness.cloud.state().describe_group_error = Some(CloudError::new(
        "AccessDenied",
        "not authorized to perform elasticache:DescribeReplicationGroups",
    ));
    let mut snap = snapshot();

    let err = harness.reconcile_snapshot(&mut snap).await.unwrap_err();

    assert!(matches!(err, Error::Cloud(_)));
    let status = snap.status.unwrap();
    assert_eq!(status.phase, SnapshotPhase::Failed);
    assert!(status.message.contains("DescribeReplicationGroups"));
}

#[tokio::test]
async fn test_persistent_lookup_error_writes_status_once() {
    let harness = harness_with_group("available");
    harness.cloud.state().describe_snapshots_error =
        Some(CloudError::new("AccessDenied", "access denied"));
    let mut snap = snapshot();

    for _ in 0..3 {
        assert!(harness.reconcile_snapshot(&mut snap).await.is_err());
    }

    assert_eq!(harness.store.snapshot_status_writes(), 1);
    assert_eq!(
        harness.store.last_snapshot_status().map(|s| s.phase),
        Some(SnapshotPhase::Failed)
    );
}

#[tokio::test]
async fn test_create_snapshot_race_is_tolerated() {
    let harness = harness_with_group("available");
    harness.cloud.state().create_snapshot_error = Some(CloudError::new(
        "SnapshotAlreadyExistsFault",
        "Snapshot already exists",
    ));
    let mut snap = snapshot();

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::InProgress);
}

#[tokio::test]
async fn test_create_snapshot_error_is_propagated() {
    let harness = harness_with_group("available");
    harness.cloud.state().create_snapshot_error = Some(CloudError::new(
        "SnapshotQuotaExceededFault",
        "too many snapshots",
    ));
    let mut snap = snapshot();

    let err = harness.reconcile_snapshot(&mut snap).await.unwrap_err();

    assert!(matches!(err, Error::Cloud(_)));
    assert_eq!(harness.store.snapshot_status_writes(), 0);
}

#[tokio::test]
async fn test_recorded_snapshot_name_is_reused() {
    let harness = harness_with_group("available");
    harness.cloud.add_snapshot("manual-bar-backup", "available");
    let mut snap = RedisSnapshotBuilder::new("bar-snap").build();
    snap.status = Some(RedisSnapshotStatus {
        phase: SnapshotPhase::InProgress,
        message: MSG_CREATION_IN_PROGRESS.to_string(),
        snapshot_name: Some("manual-bar-backup".to_string()),
    });

    let outcome = harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(outcome.phase, SnapshotPhase::Complete);
    assert_eq!(
        snap.status.and_then(|s| s.snapshot_name),
        Some("manual-bar-backup".to_string())
    );
    assert!(harness.cloud.state().create_snapshot_calls.is_empty());
}

#[tokio::test]
async fn test_unchanged_status_is_not_rewritten() {
    let harness = harness_with_group("available");
    let mut snap = snapshot();

    harness.reconcile_snapshot(&mut snap).await.unwrap();
    harness.reconcile_snapshot(&mut snap).await.unwrap();
    let writes = harness.store.snapshot_status_writes();
    assert_eq!(writes, 2);

    // Same observation again: nothing to write
    harness.reconcile_snapshot(&mut snap).await.unwrap();
    assert_eq!(harness.store.snapshot_status_writes(), writes);
}

#[tokio::test]
async fn test_snapshot_name_depends_on_creation_time() {
    let harness = harness_with_group("available");
    let mut snap = RedisSnapshotBuilder::new("bar-snap")
        .created("2025-06-30T23:59:58Z")
        .build();

    harness.reconcile_snapshot(&mut snap).await.unwrap();

    assert_eq!(
        snap.status.and_then(|s| s.snapshot_name),
        Some("bar-snap-default-20250630235958".to_string())
    );
}
