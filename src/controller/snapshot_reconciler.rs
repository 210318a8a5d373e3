//! Reconciler for RedisSnapshot resources.
//!
//! Each pass looks at the referenced RedisCluster's replication group and the
//! snapshot named after the RedisSnapshot object, then moves the snapshot
//! through its phases:
//!
//! - `Pending` / `Failed`: nothing usable observed yet
//! - `InProgress`: the snapshot was requested and is being taken
//! - `Complete`: the snapshot is available; no further passes do anything
//!
//! Every phase change is validated by `SnapshotStateMachine`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, warn};

use crate::client::{CacheControlPlane, CloudError, ReplicationGroup, ReplicationGroupStatus};
use crate::controller::common::namespace_of;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::provisioner::RedisProvider;
use crate::controller::snapshot_state_machine::{
    SnapshotEvent, SnapshotObservation, SnapshotStateMachine, determine_snapshot_event,
};
use crate::crd::{RedisCluster, RedisSnapshot, RedisSnapshotStatus, SnapshotPhase};
use crate::providers::{AWS_DEPLOYMENT_STRATEGY, snapshot_name};

/// Controller name used in metrics.
pub const CONTROLLER_NAME: &str = "redissnapshot";

/// Re-check interval after the referenced cluster could not be read.
const MISSING_CLUSTER_RECHECK: Duration = Duration::from_secs(300);

pub const MSG_CREATION_IN_PROGRESS: &str = "snapshot creation in progress";
pub const MSG_SNAPSHOT_CREATED: &str = "snapshot created";

/// Result of one snapshot pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Phase after the pass.
    pub phase: SnapshotPhase,
    /// When to look again. `None` means wait for a change.
    pub requeue_after: Option<Duration>,
}

impl SnapshotOutcome {
    fn done(phase: SnapshotPhase) -> Self {
        Self {
            phase,
            requeue_after: None,
        }
    }

    fn recheck(phase: SnapshotPhase, after: Duration) -> Self {
        Self {
            phase,
            requeue_after: Some(after),
        }
    }
}

/// Drives RedisSnapshot objects towards an available snapshot.
#[derive(Clone)]
pub struct SnapshotReconciler {
    provider: RedisProvider,
    state_machine: SnapshotStateMachine,
}

impl SnapshotReconciler {
    pub fn new(provider: RedisProvider) -> Self {
        Self {
            provider,
            state_machine: SnapshotStateMachine::new(),
        }
    }

    /// Run one pass for the snapshot.
    pub async fn reconcile(&self, snapshot: &RedisSnapshot) -> Result<SnapshotOutcome> {
        let phase = current_phase(snapshot);
        if phase.is_terminal() {
            debug!(name = %snapshot.name_any(), "Snapshot complete, nothing to do");
            return Ok(SnapshotOutcome::done(phase));
        }

        let namespace = namespace_of(&snapshot.metadata);
        let recheck = self.provider.config().snapshot_recheck_interval;
        let cluster_name = &snapshot.spec.resource_name;

        let cluster = match self
            .provider
            .backends()
            .store
            .get_cluster(&namespace, cluster_name)
            .await
        {
            Ok(cluster) => cluster,
            Err(e) => {
                let message = format!("failed to get redis cluster {}: {}", cluster_name, e);
                warn!(name = %snapshot.name_any(), cluster = %cluster_name, error = %e, "Referenced cluster unavailable");
                self.record(snapshot, SnapshotEvent::ReconcileFailed, message, None)
                    .await?;
                return Ok(SnapshotOutcome::recheck(
                    SnapshotPhase::Failed,
                    MISSING_CLUSTER_RECHECK,
                ));
            }
        };

        let strategy = cluster
            .status
            .as_ref()
            .and_then(|s| s.strategy.as_deref())
            .unwrap_or_default();
        if strategy != AWS_DEPLOYMENT_STRATEGY {
            let message = format!(
                "redis cluster {} has unsupported deployment strategy {:?}",
                cluster_name, strategy
            );
            self.record(snapshot, SnapshotEvent::ReconcileFailed, message.clone(), None)
                .await?;
            return Err(Error::UnsupportedStrategy(message));
        }

        let name = match existing_snapshot_name(snapshot) {
            Some(name) => name,
            None => match snapshot_name(&snapshot.metadata) {
                Ok(name) => name,
                Err(e) => {
                    self.record(snapshot, SnapshotEvent::ReconcileFailed, e.to_string(), None)
                        .await?;
                    return Err(e);
                }
            },
        };

        let (replication_group_id, cloud) = match self.connect(&cluster, &namespace).await {
            Ok(connected) => connected,
            Err(e) => {
                self.record(snapshot, SnapshotEvent::ReconcileFailed, e.to_string(), None)
                    .await?;
                return Err(e);
            }
        };

        let lookup = async {
            let existing = cloud.describe_snapshots(&name).await?;
            let group = cloud
                .describe_replication_group(&replication_group_id)
                .await?;
            Ok::<_, CloudError>((existing.into_iter().find(|s| s.name == name), group))
        };
        let (existing, group) = match lookup.await {
            Ok(found) => found,
            Err(e) => {
                warn!(name = %snapshot.name_any(), snapshot = %name, error = %e, "Snapshot lookup failed");
                self.record(snapshot, SnapshotEvent::ReconcileFailed, e.to_string(), None)
                    .await?;
                return Err(e.into());
            }
        };

        let observation = SnapshotObservation {
            cluster_available: cluster_available(group.as_ref(), existing.is_some()),
            snapshot_status: existing.map(|s| s.status),
        };

        match determine_snapshot_event(&observation) {
            SnapshotEvent::SnapshotRequested => {
                let Some(primary) = group.as_ref().and_then(|g| g.primary_member()) else {
                    let message = format!(
                        "no primary node found in replication group {}",
                        replication_group_id
                    );
                    self.record(snapshot, SnapshotEvent::ClusterUnavailable, message, None)
                        .await?;
                    return Ok(SnapshotOutcome::recheck(SnapshotPhase::Failed, recheck));
                };

                info!(
                    name = %snapshot.name_any(),
                    snapshot = %name,
                    cache_cluster = %primary.cache_cluster_id,
                    "Creating snapshot"
                );
                match cloud.create_snapshot(&primary.cache_cluster_id, &name).await {
                    Ok(()) => {}
                    Err(e) if e.is_snapshot_already_exists() => {
                        debug!(snapshot = %name, "Snapshot already exists");
                    }
                    Err(e) => return Err(e.into()),
                }

                self.record(
                    snapshot,
                    SnapshotEvent::SnapshotRequested,
                    MSG_CREATION_IN_PROGRESS.to_string(),
                    Some(&name),
                )
                .await?;
                Ok(SnapshotOutcome::recheck(SnapshotPhase::InProgress, recheck))
            }
            SnapshotEvent::SnapshotAvailable => {
                self.record(
                    snapshot,
                    SnapshotEvent::SnapshotAvailable,
                    MSG_SNAPSHOT_CREATED.to_string(),
                    Some(&name),
                )
                .await?;
                Ok(SnapshotOutcome::done(SnapshotPhase::Complete))
            }
            SnapshotEvent::SnapshotCreating => {
                let status = observation
                    .snapshot_status
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                self.record(
                    snapshot,
                    SnapshotEvent::SnapshotCreating,
                    format!("current snapshot status : {}", status),
                    Some(&name),
                )
                .await?;
                Ok(SnapshotOutcome::recheck(SnapshotPhase::InProgress, recheck))
            }
            event @ (SnapshotEvent::ClusterUnavailable | SnapshotEvent::ReconcileFailed) => {
                let message = match &group {
                    Some(g) => format!("current replication group status is {}", g.status),
                    None => format!("replication group {} not found", replication_group_id),
                };
                self.record(snapshot, event, message, None).await?;
                Ok(SnapshotOutcome::recheck(SnapshotPhase::Failed, recheck))
            }
        }
    }

    /// Resolve the cluster's replication group and connect to its region.
    async fn connect(
        &self,
        cluster: &RedisCluster,
        namespace: &str,
    ) -> Result<(String, Box<dyn CacheControlPlane>)> {
        let resolved = self.provider.resolve(cluster).await?;
        let cloud = self.provider.connect(namespace, &resolved.region).await?;
        Ok((resolved.replication_group_id, cloud))
    }

    /// Apply an event to the snapshot's phase and persist the status.
    async fn record(
        &self,
        snapshot: &RedisSnapshot,
        event: SnapshotEvent,
        message: String,
        name: Option<&str>,
    ) -> Result<()> {
        let from = current_phase(snapshot);
        let Some(transition) = self.state_machine.transition(from, event) else {
            return Err(Error::Validation(format!(
                "snapshot cannot handle {} in phase {}",
                event, from
            )));
        };

        let status = RedisSnapshotStatus {
            phase: transition.to,
            message,
            snapshot_name: name
                .map(str::to_string)
                .or_else(|| existing_snapshot_name(snapshot)),
        };

        if snapshot.status.as_ref() == Some(&status) {
            return Ok(());
        }

        if from != transition.to {
            info!(
                name = %snapshot.name_any(),
                from = %from,
                to = %transition.to,
                event = %event,
                reason = transition.description,
                message = %status.message,
                "Snapshot phase transition"
            );
        }

        self.provider
            .backends()
            .store
            .update_snapshot_status(snapshot, &status)
            .await
    }
}

fn current_phase(snapshot: &RedisSnapshot) -> SnapshotPhase {
    snapshot
        .status
        .as_ref()
        .map(|s| s.phase)
        .unwrap_or_default()
}

fn existing_snapshot_name(snapshot: &RedisSnapshot) -> Option<String> {
    snapshot
        .status
        .as_ref()
        .and_then(|s| s.snapshot_name.clone())
        .filter(|n| !n.is_empty())
}

/// Whether the replication group can be snapshotted.
///
/// A group reporting `snapshotting` while our snapshot exists is busy with
/// that snapshot and still counts as available.
fn cluster_available(group: Option<&ReplicationGroup>, snapshot_exists: bool) -> bool {
    match group {
        Some(g) => {
            g.status.is_available()
                || (g.status == ReplicationGroupStatus::Snapshotting && snapshot_exists)
        }
        None => false,
    }
}

// ============================================================================
// Controller glue
// ============================================================================

/// Reconcile a RedisSnapshot.
pub async fn reconcile(obj: Arc<RedisSnapshot>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let name = obj.name_any();
    let namespace = namespace_of(&obj.metadata);
    let before = current_phase(&obj);

    debug!(name = %name, namespace = %namespace, phase = %before, "Reconciling RedisSnapshot");

    let outcome = ctx.snapshot_reconciler().reconcile(&obj).await?;

    if outcome.phase != before {
        if let Some(ref health) = ctx.health_state {
            health
                .metrics
                .record_phase_transition("RedisSnapshot", &outcome.phase.to_string());
        }
        match outcome.phase {
            SnapshotPhase::Complete => {
                ctx.publish_normal_event(&*obj, "SnapshotCreated", "Reconcile", None)
                    .await;
            }
            SnapshotPhase::InProgress => {
                ctx.publish_normal_event(&*obj, "SnapshotInProgress", "Reconcile", None)
                    .await;
            }
            SnapshotPhase::Failed => {
                ctx.publish_warning_event(&*obj, "SnapshotFailed", "Reconcile", None)
                    .await;
            }
            SnapshotPhase::Pending => {}
        }
    }

    if let Some(ref health) = ctx.health_state {
        health.metrics.record_reconcile(
            CONTROLLER_NAME,
            &namespace,
            &name,
            start.elapsed().as_secs_f64(),
        );
        health.mark_reconciled();
    }

    Ok(match outcome.requeue_after {
        Some(after) => Action::requeue(after),
        None => Action::await_change(),
    })
}

/// Error policy for the RedisSnapshot controller.
pub fn error_policy(obj: Arc<RedisSnapshot>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = namespace_of(&obj.metadata);

    if error.is_retryable() {
        warn!(name = %name, namespace = %namespace, error = %error, "Snapshot reconciliation failed, retrying");
    } else {
        error!(name = %name, namespace = %namespace, error = %error, "Snapshot reconciliation failed");
    }

    if let Some(ref health) = ctx.health_state {
        health
            .metrics
            .record_error(CONTROLLER_NAME, &namespace, &name);
    }

    Action::requeue(error.requeue_after())
}
