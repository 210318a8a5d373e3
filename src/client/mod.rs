//! Managed cache control plane client.
//!
//! This module defines the capability surface the reconcilers need from the
//! cloud provider's cache service, together with an ElastiCache-backed
//! implementation. Reconcilers only ever talk to `dyn CacheControlPlane`,
//! which keeps them testable with in-memory doubles.
//!
//! ## Architecture
//!
//! - `types`: Replication group, snapshot and status types
//! - `elasticache`: `aws-sdk-elasticache` implementation
//! - `polling`: Bounded poll-until-success helper for freshly issued credentials
//!
//! ## Example
//!
//! ```rust,ignore
//! use redis_cloud_operator::client::{ControlPlaneFactory, ElastiCacheFactory};
//!
//! let cloud = ElastiCacheFactory.connect("eu-west-1", &credentials);
//! let groups = cloud.describe_replication_groups().await?;
//! ```

pub mod elasticache;
pub mod polling;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use elasticache::{ElastiCacheControlPlane, ElastiCacheFactory};
pub use polling::{PollPolicy, PollTimeout, poll_immediate};
pub use types::{
    CreateReplicationGroupRequest, Endpoint, NodeGroupMember, NodeRole, ReplicationGroup,
    ReplicationGroupStatus, Snapshot, SnapshotStatus,
};

/// Fault code returned when a replication group does not exist.
pub const REPLICATION_GROUP_NOT_FOUND: &str = "ReplicationGroupNotFoundFault";

/// Fault code returned when creating a replication group that already exists.
pub const REPLICATION_GROUP_ALREADY_EXISTS: &str = "ReplicationGroupAlreadyExists";

/// Fault code returned when a snapshot does not exist.
pub const SNAPSHOT_NOT_FOUND: &str = "SnapshotNotFoundFault";

/// Fault code returned when creating a snapshot that already exists.
pub const SNAPSHOT_ALREADY_EXISTS: &str = "SnapshotAlreadyExistsFault";

/// Error returned by the control plane.
///
/// `code` carries the service's fault code when the service answered;
/// transport and credential failures have no code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code: {})", .code.as_deref().unwrap_or("none"))]
pub struct CloudError {
    pub code: Option<String>,
    pub message: String,
}

impl CloudError {
    /// Create an error carrying a service fault code.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Create an error without a fault code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Check if the replication group does not exist.
    pub fn is_replication_group_not_found(&self) -> bool {
        self.has_code(REPLICATION_GROUP_NOT_FOUND)
    }

    /// Check if the replication group already exists.
    pub fn is_replication_group_already_exists(&self) -> bool {
        self.has_code(REPLICATION_GROUP_ALREADY_EXISTS)
            || self.has_code("ReplicationGroupAlreadyExistsFault")
    }

    /// Check if the snapshot does not exist.
    pub fn is_snapshot_not_found(&self) -> bool {
        self.has_code(SNAPSHOT_NOT_FOUND)
    }

    /// Check if the snapshot already exists.
    pub fn is_snapshot_already_exists(&self) -> bool {
        self.has_code(SNAPSHOT_ALREADY_EXISTS)
    }
}

/// Cloud provider credentials scoped to a tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Operations the reconcilers need from the managed cache service.
#[async_trait]
pub trait CacheControlPlane: Send + Sync {
    /// List every replication group visible to the credentials.
    async fn describe_replication_groups(&self) -> Result<Vec<ReplicationGroup>, CloudError>;

    /// Look up a single replication group. A missing group is `Ok(None)`.
    async fn describe_replication_group(
        &self,
        replication_group_id: &str,
    ) -> Result<Option<ReplicationGroup>, CloudError>;

    /// Issue a create call for a replication group.
    async fn create_replication_group(
        &self,
        request: &CreateReplicationGroupRequest,
    ) -> Result<(), CloudError>;

    /// Issue a delete call for a replication group.
    async fn delete_replication_group(
        &self,
        replication_group_id: &str,
        retain_primary_cluster: bool,
    ) -> Result<(), CloudError>;

    /// Find snapshots by name. A missing snapshot is an empty list.
    async fn describe_snapshots(&self, snapshot_name: &str) -> Result<Vec<Snapshot>, CloudError>;

    /// Issue a create call for a snapshot of the given cache cluster.
    async fn create_snapshot(
        &self,
        cache_cluster_id: &str,
        snapshot_name: &str,
    ) -> Result<(), CloudError>;
}

/// Builds control plane clients bound to a region and set of credentials.
pub trait ControlPlaneFactory: Send + Sync {
    fn connect(&self, region: &str, credentials: &ProviderCredentials)
    -> Box<dyn CacheControlPlane>;
}
