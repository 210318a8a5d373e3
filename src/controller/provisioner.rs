//! Replication group provisioning for RedisCluster resources.
//!
//! `RedisProvider` drives one pass of create or delete convergence:
//! resolve the tier's strategy into a `ClusterConfig`, obtain tenant
//! credentials, list replication groups through a bounded poll and act on
//! what is observed. Every pass re-derives its action from observed state, so
//! repeated or concurrent passes converge without duplicate create calls.
//!
//! The finalizer is attached before any create call and only removed after a
//! describe in the same pass confirmed the replication group is gone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{
    CacheControlPlane, CreateReplicationGroupRequest, ReplicationGroup, ReplicationGroupStatus,
    poll_immediate,
};
use crate::config::OperatorConfig;
use crate::controller::common::{
    FINALIZER, add_finalizer, has_finalizer, namespace_of, remove_finalizer,
};
use crate::controller::context::Backends;
use crate::controller::error::{Error, Result};
use crate::crd::{ClusterEndpoint, RedisCluster};
use crate::providers::REDIS_RESOURCE_TYPE;

pub const DEFAULT_CACHE_NODE_TYPE: &str = "cache.t2.micro";
pub const DEFAULT_ENGINE_VERSION: &str = "3.2.10";
pub const DEFAULT_DESCRIPTION: &str = "A Redis replication group";
pub const DEFAULT_NUM_CACHE_CLUSTERS: i32 = 2;
pub const DEFAULT_SNAPSHOT_RETENTION_LIMIT: i32 = 30;

/// Engine of every provisioned replication group.
pub const ENGINE: &str = "redis";

const DESCRIBE_REPLICATION_GROUPS: &str = "DescribeReplicationGroups";

/// Replication group parameters decoded from a strategy's create blob.
///
/// Field names follow the ElastiCache API shape; camelCase spellings are
/// accepted too. Unset fields receive defaults only when a create request is
/// built, never when observing an existing group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterConfig {
    #[serde(default, alias = "replicationGroupId", skip_serializing_if = "Option::is_none")]
    pub replication_group_id: Option<String>,

    #[serde(default, alias = "cacheNodeType", skip_serializing_if = "Option::is_none")]
    pub cache_node_type: Option<String>,

    #[serde(default, alias = "engineVersion", skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,

    #[serde(
        default,
        rename = "ReplicationGroupDescription",
        alias = "replicationGroupDescription",
        alias = "description",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(default, alias = "numCacheClusters", skip_serializing_if = "Option::is_none")]
    pub num_cache_clusters: Option<i32>,

    #[serde(
        default,
        alias = "snapshotRetentionLimit",
        skip_serializing_if = "Option::is_none"
    )]
    pub snapshot_retention_limit: Option<i32>,
}

impl ClusterConfig {
    /// Decode a strategy's create blob. An absent blob is an empty config.
    pub fn from_strategy(create_strategy: &serde_json::Value) -> Result<Self> {
        if create_strategy.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(create_strategy.clone()).map_err(|e| {
            Error::Strategy(format!("failed to parse redis create strategy: {}", e))
        })
    }

    /// Build a create request, filling unset fields with defaults.
    pub fn create_request(&self, replication_group_id: &str) -> CreateReplicationGroupRequest {
        CreateReplicationGroupRequest {
            replication_group_id: replication_group_id.to_string(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            cache_node_type: self
                .cache_node_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CACHE_NODE_TYPE.to_string()),
            engine: ENGINE.to_string(),
            engine_version: self
                .engine_version
                .clone()
                .unwrap_or_else(|| DEFAULT_ENGINE_VERSION.to_string()),
            num_cache_clusters: self
                .num_cache_clusters
                .unwrap_or(DEFAULT_NUM_CACHE_CLUSTERS),
            snapshot_retention_limit: self
                .snapshot_retention_limit
                .unwrap_or(DEFAULT_SNAPSHOT_RETENTION_LIMIT),
            automatic_failover_enabled: true,
        }
    }
}

/// Pick the region: resource override, then strategy, then operator default.
pub fn resolve_region(spec_region: Option<&str>, strategy_region: &str, default: &str) -> String {
    spec_region
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .or_else(|| Some(strategy_region.trim()).filter(|r| !r.is_empty()))
        .unwrap_or(default)
        .to_string()
}

/// A cluster's strategy resolved into concrete provisioning parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCluster {
    pub replication_group_id: String,
    pub region: String,
    pub config: ClusterConfig,
}

/// Outcome of one create pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned {
    /// Identifier of the replication group backing the cluster.
    pub replication_group_id: String,
    /// Status observed this pass. `None` when the group was just requested.
    pub observed: Option<ReplicationGroupStatus>,
    /// Primary endpoint once the group is available.
    pub endpoint: Option<ClusterEndpoint>,
}

/// Provisions and deletes replication groups for RedisCluster resources.
#[derive(Clone)]
pub struct RedisProvider {
    backends: Backends,
    config: Arc<OperatorConfig>,
}

impl RedisProvider {
    pub fn new(backends: Backends, config: Arc<OperatorConfig>) -> Self {
        Self { backends, config }
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Resolve the cluster's tier into concrete provisioning parameters.
    pub async fn resolve(&self, cluster: &RedisCluster) -> Result<ResolvedCluster> {
        let strategy = self
            .backends
            .resolver
            .resolve(REDIS_RESOURCE_TYPE, &cluster.spec.tier)
            .await?;
        let config = ClusterConfig::from_strategy(&strategy.create_strategy)?;

        let replication_group_id = match config.replication_group_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => cluster
                .metadata
                .name
                .clone()
                .ok_or_else(|| Error::MissingField("metadata.name".to_string()))?,
        };

        let region = resolve_region(
            cluster.spec.region.as_deref(),
            &strategy.region,
            &self.config.default_region,
        );

        Ok(ResolvedCluster {
            replication_group_id,
            region,
            config,
        })
    }

    /// Build a control plane client for the tenant in the given region.
    pub async fn connect(&self, tenant: &str, region: &str) -> Result<Box<dyn CacheControlPlane>> {
        let credentials = self.backends.broker.issue_credentials(tenant).await?;
        debug!(namespace = %tenant, region = %region, "Connecting to control plane");
        Ok(self.backends.control_plane.connect(region, &credentials))
    }

    /// List every replication group, polling until the call succeeds.
    pub async fn list_replication_groups(
        &self,
        cloud: &dyn CacheControlPlane,
    ) -> Result<Vec<ReplicationGroup>> {
        poll_immediate(&self.config.poll, DESCRIBE_REPLICATION_GROUPS, || {
            cloud.describe_replication_groups()
        })
        .await
        .map_err(|e| Error::timeout(DESCRIBE_REPLICATION_GROUPS, e))
    }

    /// Converge towards an existing, available replication group.
    ///
    /// Returns the primary endpoint once the group is available, `None` while
    /// it is still being provisioned.
    pub async fn create_cluster(
        &self,
        cluster: &mut RedisCluster,
    ) -> Result<Option<ClusterEndpoint>> {
        Ok(self.provision(cluster).await?.endpoint)
    }

    /// One create pass, reporting what was observed.
    pub async fn provision(&self, cluster: &mut RedisCluster) -> Result<Provisioned> {
        let namespace = namespace_of(&cluster.metadata);
        let name = cluster.metadata.name.clone().unwrap_or_default();

        if cluster.metadata.deletion_timestamp.is_none()
            && !has_finalizer(&cluster.metadata, FINALIZER)
        {
            info!(name = %name, namespace = %namespace, "Adding finalizer");
            self.backends
                .store
                .add_cluster_finalizer(&namespace, &name, FINALIZER)
                .await?;
            add_finalizer(&mut cluster.metadata, FINALIZER);
        }

        let resolved = self.resolve(cluster).await?;
        let cloud = self.connect(&namespace, &resolved.region).await?;
        let groups = self.list_replication_groups(cloud.as_ref()).await?;
        let id = resolved.replication_group_id.clone();

        let Some(group) = groups.into_iter().find(|g| g.id == id) else {
            let request = resolved.config.create_request(&id);
            info!(
                name = %name,
                namespace = %namespace,
                replication_group = %id,
                region = %resolved.region,
                node_type = %request.cache_node_type,
                "Creating replication group"
            );

            match cloud.create_replication_group(&request).await {
                Ok(()) => {}
                // Another pass created it between our list and create
                Err(e) if e.is_replication_group_already_exists() => {
                    debug!(replication_group = %id, "Replication group already exists");
                }
                Err(e) => return Err(e.into()),
            }

            return Ok(Provisioned {
                replication_group_id: id,
                observed: None,
                endpoint: None,
            });
        };

        if !group.status.is_available() {
            debug!(
                replication_group = %id,
                status = %group.status,
                "Replication group not yet available"
            );
            return Ok(Provisioned {
                replication_group_id: id,
                observed: Some(group.status),
                endpoint: None,
            });
        }

        let endpoint = match group.primary_endpoint {
            Some(endpoint) => Some(ClusterEndpoint {
                uri: endpoint.address,
                port: endpoint.port,
            }),
            None => {
                warn!(
                    replication_group = %id,
                    "Replication group is available but reports no primary endpoint"
                );
                None
            }
        };

        Ok(Provisioned {
            replication_group_id: id,
            observed: Some(group.status),
            endpoint,
        })
    }

    /// Converge towards no replication group, then release the finalizer.
    pub async fn delete_cluster(&self, cluster: &mut RedisCluster) -> Result<()> {
        let namespace = namespace_of(&cluster.metadata);
        let name = cluster.metadata.name.clone().unwrap_or_default();

        let resolved = self.resolve(cluster).await?;
        let cloud = self.connect(&namespace, &resolved.region).await?;
        let groups = self.list_replication_groups(cloud.as_ref()).await?;
        let id = resolved.replication_group_id;

        let Some(group) = groups.into_iter().find(|g| g.id == id) else {
            if has_finalizer(&cluster.metadata, FINALIZER) {
                info!(
                    name = %name,
                    namespace = %namespace,
                    replication_group = %id,
                    "Replication group gone, removing finalizer"
                );
                self.backends
                    .store
                    .remove_cluster_finalizer(&namespace, &name, FINALIZER)
                    .await?;
                remove_finalizer(&mut cluster.metadata, FINALIZER);
            }
            return Ok(());
        };

        if !group.status.is_available() {
            debug!(
                replication_group = %id,
                status = %group.status,
                "Waiting for replication group before deleting"
            );
            return Ok(());
        }

        info!(name = %name, namespace = %namespace, replication_group = %id, "Deleting replication group");
        match cloud.delete_replication_group(&id, false).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_replication_group_not_found() => {
                debug!(replication_group = %id, "Replication group already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
