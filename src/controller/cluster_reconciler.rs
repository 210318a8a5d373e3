//! Reconciler for RedisCluster resources.
//!
//! Maps provisioner outcomes onto the RedisCluster status and the controller's
//! requeue schedule:
//!
//! - deletion requested: `Deleting`, re-check every 30s until the finalizer is gone
//! - replication group requested or still coming up: `Provisioning`, re-check every 30s
//! - replication group available: `Available` with the endpoint, drift check every 5m
//! - error: `Failed` with the error message, then the error policy

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, warn};

use crate::controller::common::{FINALIZER, has_finalizer, namespace_of};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::provisioner::Provisioned;
use crate::controller::status::cluster_conditions;
use crate::crd::{ClusterEndpoint, ClusterPhase, RedisCluster, RedisClusterStatus};
use crate::providers::AWS_DEPLOYMENT_STRATEGY;

/// Controller name used in metrics.
pub const CONTROLLER_NAME: &str = "rediscluster";

/// Re-check interval while a replication group is being created or deleted.
pub const PROGRESS_REQUEUE: Duration = Duration::from_secs(30);

/// Re-check interval once a replication group is available.
pub const AVAILABLE_REQUEUE: Duration = Duration::from_secs(300);

/// Main reconciliation function for RedisCluster.
pub async fn reconcile(obj: Arc<RedisCluster>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let name = obj.name_any();
    let namespace = namespace_of(&obj.metadata);

    debug!(name = %name, namespace = %namespace, "Reconciling RedisCluster");

    let mut cluster = (*obj).clone();
    let result = if cluster.metadata.deletion_timestamp.is_some() {
        reconcile_deletion(&mut cluster, &ctx).await
    } else {
        reconcile_creation(&mut cluster, &ctx).await
    };

    if let Some(ref health) = ctx.health_state {
        if result.is_ok() {
            health.metrics.record_reconcile(
                CONTROLLER_NAME,
                &namespace,
                &name,
                start.elapsed().as_secs_f64(),
            );
            health.mark_reconciled();
        }
    }

    result
}

async fn reconcile_creation(cluster: &mut RedisCluster, ctx: &Context) -> Result<Action> {
    match ctx.provider().provision(cluster).await {
        Ok(provisioned) => {
            let (phase, message) = describe(&provisioned);
            let action = if phase == ClusterPhase::Available {
                Action::requeue(AVAILABLE_REQUEUE)
            } else {
                Action::requeue(PROGRESS_REQUEUE)
            };

            let mut status = status_for(cluster, phase, &message);
            status.strategy = Some(AWS_DEPLOYMENT_STRATEGY.to_string());
            status.replication_group_id = Some(provisioned.replication_group_id.clone());
            status.endpoint = provisioned.endpoint.clone();
            update_status(cluster, ctx, status).await?;

            Ok(action)
        }
        Err(e) => {
            warn!(name = %cluster.name_any(), error = %e, "Provisioning failed");
            let status = status_for(cluster, ClusterPhase::Failed, &e.to_string());
            if let Err(update_err) = update_status(cluster, ctx, status).await {
                warn!(error = %update_err, "Failed to record failure in status");
            }
            Err(e)
        }
    }
}

async fn reconcile_deletion(cluster: &mut RedisCluster, ctx: &Context) -> Result<Action> {
    if !has_finalizer(&cluster.metadata, FINALIZER) {
        debug!(name = %cluster.name_any(), "No finalizer, nothing to clean up");
        return Ok(Action::await_change());
    }

    let status = status_for(
        cluster,
        ClusterPhase::Deleting,
        "deleting replication group",
    );
    update_status(cluster, ctx, status).await?;

    ctx.provider().delete_cluster(cluster).await?;

    if has_finalizer(&cluster.metadata, FINALIZER) {
        Ok(Action::requeue(PROGRESS_REQUEUE))
    } else {
        info!(name = %cluster.name_any(), "RedisCluster cleanup complete");
        Ok(Action::await_change())
    }
}

/// Phase and message for a create pass outcome.
pub fn describe(provisioned: &Provisioned) -> (ClusterPhase, String) {
    match (&provisioned.endpoint, &provisioned.observed) {
        (Some(endpoint), _) => (
            ClusterPhase::Available,
            format!("replication group available at {}", endpoint),
        ),
        (None, None) => (
            ClusterPhase::Provisioning,
            format!(
                "creation of replication group {} requested",
                provisioned.replication_group_id
            ),
        ),
        (None, Some(status)) => (
            ClusterPhase::Provisioning,
            format!(
                "replication group {} is {}",
                provisioned.replication_group_id, status
            ),
        ),
    }
}

/// Build a status for the given phase, keeping fields not owned by the phase.
fn status_for(cluster: &RedisCluster, phase: ClusterPhase, message: &str) -> RedisClusterStatus {
    let generation = cluster.metadata.generation;
    let current = cluster.status.clone().unwrap_or_default();
    RedisClusterStatus {
        phase,
        message: message.to_string(),
        observed_generation: generation,
        conditions: cluster_conditions(&current.conditions, phase, message, generation),
        ..current
    }
}

/// Whether two statuses differ in anything but condition timestamps.
fn status_changed(current: Option<&RedisClusterStatus>, next: &RedisClusterStatus) -> bool {
    let Some(current) = current else {
        return true;
    };
    current.phase != next.phase
        || current.message != next.message
        || current.strategy != next.strategy
        || current.replication_group_id != next.replication_group_id
        || current.endpoint != next.endpoint
        || current.observed_generation != next.observed_generation
}

async fn update_status(
    cluster: &RedisCluster,
    ctx: &Context,
    status: RedisClusterStatus,
) -> Result<()> {
    if !status_changed(cluster.status.as_ref(), &status) {
        return Ok(());
    }

    let previous = cluster.status.as_ref().map(|s| s.phase).unwrap_or_default();
    if previous != status.phase {
        info!(
            name = %cluster.name_any(),
            from = %previous,
            to = %status.phase,
            message = %status.message,
            "Cluster phase transition"
        );
        if let Some(ref health) = ctx.health_state {
            health
                .metrics
                .record_phase_transition("RedisCluster", &status.phase.to_string());
        }
        publish_phase_event(cluster, ctx, status.phase, status.endpoint.as_ref(), &status.message)
            .await;
    }

    ctx.backends
        .store
        .update_cluster_status(cluster, &status)
        .await
}

async fn publish_phase_event(
    cluster: &RedisCluster,
    ctx: &Context,
    phase: ClusterPhase,
    endpoint: Option<&ClusterEndpoint>,
    message: &str,
) {
    match phase {
        ClusterPhase::Available => {
            ctx.publish_normal_event(
                cluster,
                "Available",
                "Provision",
                endpoint.map(|e| format!("Primary endpoint {}", e)),
            )
            .await;
        }
        ClusterPhase::Provisioning => {
            ctx.publish_normal_event(cluster, "Provisioning", "Provision", Some(message.to_string()))
                .await;
        }
        ClusterPhase::Deleting => {
            ctx.publish_normal_event(cluster, "Deleting", "Delete", None)
                .await;
        }
        ClusterPhase::Failed => {
            ctx.publish_warning_event(cluster, "Failed", "Reconcile", Some(message.to_string()))
                .await;
        }
        ClusterPhase::Pending => {}
    }
}

/// Error policy for the RedisCluster controller.
pub fn error_policy(obj: Arc<RedisCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = namespace_of(&obj.metadata);

    if error.is_not_found() {
        debug!(name = %name, "RedisCluster no longer exists");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, namespace = %namespace, error = %error, "Reconciliation failed, retrying");
    } else {
        error!(name = %name, namespace = %namespace, error = %error, "Reconciliation failed");
    }

    if let Some(ref health) = ctx.health_state {
        health
            .metrics
            .record_error(CONTROLLER_NAME, &namespace, &name);
    }

    Action::requeue(error.requeue_after())
}
