//! RedisSnapshot Custom Resource Definition.
//!
//! Requests a point-in-time backup of the primary node of a RedisCluster's
//! replication group. Progress is reported through `status.phase` and
//! `status.message`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// RedisSnapshot CRD
// ============================================================================

/// RedisSnapshot requests a snapshot of a RedisCluster.
///
/// The snapshot name is derived once from the object's identity and creation
/// time, so every reconciliation of the same object targets the same
/// external snapshot.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cloudcache.smoketurner.com",
    version = "v1alpha1",
    kind = "RedisSnapshot",
    plural = "redissnapshots",
    shortname = "rsnap",
    status = "RedisSnapshotStatus",
    namespaced,
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.resourceName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RedisSnapshotSpec {
    /// Name of the RedisCluster (in the same namespace) to snapshot.
    pub resource_name: String,
}

// ============================================================================
// RedisSnapshot Status
// ============================================================================

/// Status of a RedisSnapshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedisSnapshotStatus {
    /// Current phase of the snapshot.
    #[serde(default)]
    pub phase: SnapshotPhase,

    /// Human-readable detail about the current phase.
    #[serde(default)]
    pub message: String,

    /// Name of the external snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_name: Option<String>,
}

/// Phase of a snapshot request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum SnapshotPhase {
    /// Snapshot has been requested but not yet started.
    #[default]
    Pending,

    /// Snapshot creation is in progress.
    InProgress,

    /// Snapshot is available.
    Complete,

    /// The last reconciliation could not make progress; see the message.
    Failed,
}

impl std::fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotPhase::Pending => write!(f, "Pending"),
            SnapshotPhase::InProgress => write!(f, "InProgress"),
            SnapshotPhase::Complete => write!(f, "Complete"),
            SnapshotPhase::Failed => write!(f, "Failed"),
        }
    }
}

impl SnapshotPhase {
    /// Check if this is a terminal phase.
    ///
    /// Only `Complete` is terminal. `Failed` is re-evaluated on the next pass.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SnapshotPhase::Complete)
    }
}

// ============================================================================
// Tests
// ============================================================================
