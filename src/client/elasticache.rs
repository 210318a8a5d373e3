//! ElastiCache implementation of the control plane.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_elasticache::Client;
use aws_sdk_elasticache::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_elasticache::types as aws;
use tracing::debug;

use super::types::{
    CreateReplicationGroupRequest, Endpoint, NodeGroupMember, NodeRole, ReplicationGroup,
    ReplicationGroupStatus, Snapshot, SnapshotStatus,
};
use super::{CacheControlPlane, CloudError, ControlPlaneFactory, ProviderCredentials};
use crate::crd::DEFAULT_CLIENT_PORT;

/// Name reported as the provider of statically issued credentials.
const CREDENTIALS_PROVIDER_NAME: &str = "redis-cloud-operator";

/// Builds ElastiCache clients from tenant credentials.
#[derive(Clone, Debug, Default)]
pub struct ElastiCacheFactory;

impl ControlPlaneFactory for ElastiCacheFactory {
    fn connect(
        &self,
        region: &str,
        credentials: &ProviderCredentials,
    ) -> Box<dyn CacheControlPlane> {
        Box::new(ElastiCacheControlPlane::new(region, credentials))
    }
}

/// ElastiCache control plane client bound to one region and credential set.
#[derive(Clone, Debug)]
pub struct ElastiCacheControlPlane {
    client: Client,
}

impl ElastiCacheControlPlane {
    /// Create a client for the given region using static credentials.
    pub fn new(region: &str, credentials: &ProviderCredentials) -> Self {
        let credentials = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let sdk_config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .build();

        Self {
            client: Client::new(&sdk_config),
        }
    }
}

/// Convert an SDK error into a `CloudError`, keeping the service fault code.
fn cloud_error<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = format!("{} failed: {}", operation, DisplayErrorContext(&err));
    CloudError { code, message }
}

fn convert_replication_group(group: &aws::ReplicationGroup) -> ReplicationGroup {
    let primary_endpoint = group
        .node_groups()
        .iter()
        .find_map(|node_group| node_group.primary_endpoint())
        .and_then(|endpoint| {
            Some(Endpoint {
                address: endpoint.address()?.to_string(),
                port: endpoint.port().unwrap_or(DEFAULT_CLIENT_PORT),
            })
        });

    let members = group
        .node_groups()
        .iter()
        .flat_map(|node_group| node_group.node_group_members())
        .filter_map(|member| {
            Some(NodeGroupMember {
                cache_cluster_id: member.cache_cluster_id()?.to_string(),
                role: NodeRole::parse(member.current_role().unwrap_or_default()),
            })
        })
        .collect();

    ReplicationGroup {
        id: group.replication_group_id().unwrap_or_default().to_string(),
        status: ReplicationGroupStatus::parse(group.status().unwrap_or_default()),
        primary_endpoint,
        members,
    }
}

fn convert_snapshot(snapshot: &aws::Snapshot) -> Snapshot {
    Snapshot {
        name: snapshot.snapshot_name().unwrap_or_default().to_string(),
        status: SnapshotStatus::parse(snapshot.snapshot_status().unwrap_or_default()),
    }
}

#[async_trait]
impl CacheControlPlane for ElastiCacheControlPlane {
    async fn describe_replication_groups(&self) -> Result<Vec<ReplicationGroup>, CloudError> {
        let mut groups = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_replication_groups()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| cloud_error("DescribeReplicationGroups", e))?;

            groups.extend(
                output
                    .replication_groups()
                    .iter()
                    .map(convert_replication_group),
            );

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(count = groups.len(), "Described replication groups");
        Ok(groups)
    }

    async fn describe_replication_group(
        &self,
        replication_group_id: &str,
    ) -> Result<Option<ReplicationGroup>, CloudError> {
        let result = self
            .client
            .describe_replication_groups()
            .replication_group_id(replication_group_id)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output
                .replication_groups()
                .iter()
                .map(convert_replication_group)
                .find(|group| group.id == replication_group_id)),
            Err(e) => {
                let err = cloud_error("DescribeReplicationGroups", e);
                if err.is_replication_group_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_replication_group(
        &self,
        request: &CreateReplicationGroupRequest,
    ) -> Result<(), CloudError> {
        self.client
            .create_replication_group()
            .replication_group_id(&request.replication_group_id)
            .replication_group_description(&request.description)
            .cache_node_type(&request.cache_node_type)
            .engine(&request.engine)
            .engine_version(&request.engine_version)
            .num_cache_clusters(request.num_cache_clusters)
            .snapshot_retention_limit(request.snapshot_retention_limit)
            .automatic_failover_enabled(request.automatic_failover_enabled)
            .send()
            .await
            .map_err(|e| cloud_error("CreateReplicationGroup", e))?;
        Ok(())
    }

    async fn delete_replication_group(
        &self,
        replication_group_id: &str,
        retain_primary_cluster: bool,
    ) -> Result<(), CloudError> {
        self.client
            .delete_replication_group()
            .replication_group_id(replication_group_id)
            .retain_primary_cluster(retain_primary_cluster)
            .send()
            .await
            .map_err(|e| cloud_error("DeleteReplicationGroup", e))?;
        Ok(())
    }

    async fn describe_snapshots(&self, snapshot_name: &str) -> Result<Vec<Snapshot>, CloudError> {
        let result = self
            .client
            .describe_snapshots()
            .snapshot_name(snapshot_name)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.snapshots().iter().map(convert_snapshot).collect()),
            Err(e) => {
                let err = cloud_error("DescribeSnapshots", e);
                if err.is_snapshot_not_found() {
                    Ok(Vec::new())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_snapshot(
        &self,
        cache_cluster_id: &str,
        snapshot_name: &str,
    ) -> Result<(), CloudError> {
        self.client
            .create_snapshot()
            .cache_cluster_id(cache_cluster_id)
            .snapshot_name(snapshot_name)
            .send()
            .await
            .map_err(|e| cloud_error("CreateSnapshot", e))?;
        Ok(())
    }
}
