//! Types for replication groups and snapshots reported by the control plane.
//!
//! The control plane reports statuses as free-form strings. They are mapped
//! here onto closed enums so that reconciliation logic matches on variants
//! instead of comparing strings. Unrecognised values are preserved in an
//! `Unknown` variant rather than silently treated as a known state.

use std::fmt;

/// Lifecycle status of a replication group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationGroupStatus {
    /// The replication group is being created.
    Creating,
    /// The replication group is serving traffic.
    Available,
    /// A configuration change is being applied.
    Modifying,
    /// The replication group is being deleted.
    Deleting,
    /// Creation failed on the control plane side.
    CreateFailed,
    /// A snapshot of one of the nodes is being taken.
    Snapshotting,
    /// A status string this operator does not know about.
    Unknown(String),
}

impl ReplicationGroupStatus {
    /// Map the control plane's status string.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "creating" => ReplicationGroupStatus::Creating,
            "available" => ReplicationGroupStatus::Available,
            "modifying" => ReplicationGroupStatus::Modifying,
            "deleting" => ReplicationGroupStatus::Deleting,
            "create-failed" => ReplicationGroupStatus::CreateFailed,
            "snapshotting" => ReplicationGroupStatus::Snapshotting,
            _ => ReplicationGroupStatus::Unknown(status.to_string()),
        }
    }

    /// Check if the replication group is available.
    pub fn is_available(&self) -> bool {
        matches!(self, ReplicationGroupStatus::Available)
    }
}

impl fmt::Display for ReplicationGroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationGroupStatus::Creating => write!(f, "creating"),
            ReplicationGroupStatus::Available => write!(f, "available"),
            ReplicationGroupStatus::Modifying => write!(f, "modifying"),
            ReplicationGroupStatus::Deleting => write!(f, "deleting"),
            ReplicationGroupStatus::CreateFailed => write!(f, "create-failed"),
            ReplicationGroupStatus::Snapshotting => write!(f, "snapshotting"),
            ReplicationGroupStatus::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Status of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// The snapshot is being taken.
    Creating,
    /// The snapshot is complete and usable.
    Available,
    /// A cluster is being restored from the snapshot.
    Restoring,
    /// The snapshot is being copied.
    Copying,
    /// The snapshot is being deleted.
    Deleting,
    /// A status string this operator does not know about.
    Unknown(String),
}

impl SnapshotStatus {
    /// Map the control plane's status string.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "creating" => SnapshotStatus::Creating,
            "available" => SnapshotStatus::Available,
            "restoring" => SnapshotStatus::Restoring,
            "copying" => SnapshotStatus::Copying,
            "deleting" => SnapshotStatus::Deleting,
            _ => SnapshotStatus::Unknown(status.to_string()),
        }
    }

    /// Check if the snapshot is available.
    pub fn is_available(&self) -> bool {
        matches!(self, SnapshotStatus::Available)
    }
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotStatus::Creating => write!(f, "creating"),
            SnapshotStatus::Available => write!(f, "available"),
            SnapshotStatus::Restoring => write!(f, "restoring"),
            SnapshotStatus::Copying => write!(f, "copying"),
            SnapshotStatus::Deleting => write!(f, "deleting"),
            SnapshotStatus::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Role of a node within a replication group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRole {
    /// Accepts writes.
    Primary,
    /// Read replica of the primary.
    Replica,
    /// A role string this operator does not know about.
    Unknown(String),
}

impl NodeRole {
    /// Map the control plane's role string.
    pub fn parse(role: &str) -> Self {
        match role.trim().to_lowercase().as_str() {
            "primary" => NodeRole::Primary,
            "replica" => NodeRole::Replica,
            _ => NodeRole::Unknown(role.to_string()),
        }
    }
}

/// Network endpoint of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: i32,
}

/// A member node of a replication group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroupMember {
    /// Identifier of the cache cluster backing this node.
    pub cache_cluster_id: String,
    /// Current role of the node.
    pub role: NodeRole,
}

/// A replication group as observed on the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationGroup {
    /// Replication group identifier.
    pub id: String,
    /// Current lifecycle status.
    pub status: ReplicationGroupStatus,
    /// Primary endpoint, reported once the group has one.
    pub primary_endpoint: Option<Endpoint>,
    /// Member nodes across the group's node group.
    pub members: Vec<NodeGroupMember>,
}

impl ReplicationGroup {
    /// Find the node currently holding the primary role.
    pub fn primary_member(&self) -> Option<&NodeGroupMember> {
        self.members.iter().find(|m| m.role == NodeRole::Primary)
    }
}

/// A snapshot as observed on the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub status: SnapshotStatus,
}

/// Parameters of a create-replication-group call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReplicationGroupRequest {
    pub replication_group_id: String,
    pub description: String,
    pub cache_node_type: String,
    pub engine: String,
    pub engine_version: String,
    pub num_cache_clusters: i32,
    pub snapshot_retention_limit: i32,
    pub automatic_failover_enabled: bool,
}
