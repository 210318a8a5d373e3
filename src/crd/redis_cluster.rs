//! RedisCluster Custom Resource Definition.
//!
//! Declares a managed Redis replication group. The operator resolves the
//! requested tier into a concrete ElastiCache configuration, provisions the
//! replication group and publishes its primary endpoint in the status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// RedisCluster is a custom resource for provisioning a managed Redis cluster.
///
/// Example:
/// ```yaml
/// apiVersion: cloudcache.smoketurner.com/v1alpha1
/// kind: RedisCluster
/// metadata:
///   name: sessions
/// spec:
///   tier: production
///   region: eu-west-1
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cloudcache.smoketurner.com",
    version = "v1alpha1",
    kind = "RedisCluster",
    plural = "redisclusters",
    shortname = "rc",
    status = "RedisClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Tier", "type":"string", "jsonPath":".spec.tier"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Endpoint", "type":"string", "jsonPath":".status.endpoint.uri"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RedisClusterSpec {
    /// Deployment tier used to look up the provisioning strategy
    /// (e.g. "development", "production").
    pub tier: String,

    /// Region override. When unset, the region from the resolved strategy
    /// is used, falling back to the operator's default region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Status of a RedisCluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedisClusterStatus {
    /// Current phase of the cluster lifecycle.
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Deployment strategy that provisioned this cluster (e.g. "aws").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// External replication group identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_group_id: Option<String>,

    /// Primary endpoint, set once the replication group is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ClusterEndpoint>,

    /// Human-readable detail about the current phase.
    #[serde(default)]
    pub message: String,

    /// The generation most recently observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions describing the current state.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Connection details of a provisioned cluster's primary node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEndpoint {
    /// Hostname or IP address of the primary endpoint.
    pub uri: String,
    /// Client port of the primary endpoint.
    pub port: i32,
}

impl std::fmt::Display for ClusterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uri, self.port)
    }
}

/// ClusterPhase represents the current lifecycle phase of a RedisCluster.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ClusterPhase {
    /// Initial state, waiting for reconciliation.
    #[default]
    Pending,
    /// Create call issued, waiting for the replication group to become available.
    Provisioning,
    /// Replication group is available and the endpoint is published.
    Available,
    /// Replication group is being deleted.
    Deleting,
    /// The last reconciliation failed; see the status message.
    Failed,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Provisioning => write!(f, "Provisioning"),
            ClusterPhase::Available => write!(f, "Available"),
            ClusterPhase::Deleting => write!(f, "Deleting"),
            ClusterPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Standard Kubernetes status condition.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// "Ready" or "Progressing".
    pub r#type: String,
    /// "True" or "False".
    pub status: String,
    /// Phase that produced the condition.
    pub reason: String,
    pub message: String,
    /// RFC 3339 time the status last flipped.
    pub last_transition_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// A condition that transitioned now.
    pub fn new(
        condition_type: &str,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }
}

/// Default client port for Redis.
pub const DEFAULT_CLIENT_PORT: i32 = 6379;
