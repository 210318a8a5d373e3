//! Persistence of desired-state objects.
//!
//! The reconcilers read and write RedisCluster and RedisSnapshot objects only
//! through `ObjectStore`, with `KubeStore` as the API server implementation.

use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;

use crate::controller::common::{add_finalizer, namespace_of, remove_finalizer};
use crate::controller::context::FIELD_MANAGER;
use crate::controller::error::Result;
use crate::crd::{RedisCluster, RedisClusterStatus, RedisSnapshot, RedisSnapshotStatus};

/// Read and write access to the operator's custom resources.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a RedisCluster by namespace and name.
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<RedisCluster>;

    /// Add `finalizer` to the stored cluster unless it is already there.
    async fn add_cluster_finalizer(&self, namespace: &str, name: &str, finalizer: &str)
    -> Result<()>;

    /// Remove `finalizer` from the stored cluster. A cluster that no longer
    /// exists counts as done.
    async fn remove_cluster_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<()>;

    /// Persist the cluster's status.
    async fn update_cluster_status(
        &self,
        cluster: &RedisCluster,
        status: &RedisClusterStatus,
    ) -> Result<()>;

    /// Persist the snapshot's status.
    async fn update_snapshot_status(
        &self,
        snapshot: &RedisSnapshot,
        status: &RedisSnapshotStatus,
    ) -> Result<()>;
}

/// Write the finalizer list of a freshly read object.
///
/// The patch carries the resourceVersion it was read at, so a concurrent
/// change to the object fails with a 409 conflict instead of being
/// overwritten.
async fn patch_finalizers(api: &Api<RedisCluster>, current: &RedisCluster) -> Result<()> {
    let patch = json!({
        "metadata": {
            "resourceVersion": current.resource_version(),
            "finalizers": current.finalizers(),
        }
    });
    api.patch(
        &current.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// `ObjectStore` backed by the Kubernetes API using merge patches.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<RedisCluster> {
        let api: Api<RedisCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn add_cluster_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<()> {
        let api: Api<RedisCluster> = Api::namespaced(self.client.clone(), namespace);
        let mut current = api.get(name).await?;
        if add_finalizer(&mut current.metadata, finalizer) {
            patch_finalizers(&api, &current).await?;
        }
        Ok(())
    }

    async fn remove_cluster_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<()> {
        let api: Api<RedisCluster> = Api::namespaced(self.client.clone(), namespace);
        let mut current = match api.get(name).await {
            Ok(cluster) => cluster,
            Err(kube::Error::Api(e)) if e.code == 404 => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if remove_finalizer(&mut current.metadata, finalizer) {
            patch_finalizers(&api, &current).await?;
        }
        Ok(())
    }

    async fn update_cluster_status(
        &self,
        cluster: &RedisCluster,
        status: &RedisClusterStatus,
    ) -> Result<()> {
        let api: Api<RedisCluster> =
            Api::namespaced(self.client.clone(), &namespace_of(&cluster.metadata));
        let patch = json!({ "status": status });
        api.patch_status(
            &cluster.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    async fn update_snapshot_status(
        &self,
        snapshot: &RedisSnapshot,
        status: &RedisSnapshotStatus,
    ) -> Result<()> {
        let api: Api<RedisSnapshot> =
            Api::namespaced(self.client.clone(), &namespace_of(&snapshot.metadata));
        let patch = json!({ "status": status });
        api.patch_status(
            &snapshot.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}
