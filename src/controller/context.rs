//! State shared by both reconcilers: the client, configuration, backends and
//! event reporting.

use std::sync::Arc;

use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};

use crate::client::{ControlPlaneFactory, ElastiCacheFactory};
use crate::config::OperatorConfig;
use crate::controller::provisioner::RedisProvider;
use crate::controller::snapshot_reconciler::SnapshotReconciler;
use crate::controller::store::{KubeStore, ObjectStore};
use crate::health::HealthState;
use crate::providers::{
    ConfigMapStrategyResolver, CredentialBroker, SecretCredentialBroker, StrategyResolver,
};

/// Field manager name for the operator
pub const FIELD_MANAGER: &str = "redis-cloud-operator";

/// Collaborators used by the provisioner and snapshot reconciler.
#[derive(Clone)]
pub struct Backends {
    /// Desired-state object persistence
    pub store: Arc<dyn ObjectStore>,
    /// Tier to strategy lookup
    pub resolver: Arc<dyn StrategyResolver>,
    /// Tenant credential issuance
    pub broker: Arc<dyn CredentialBroker>,
    /// Control plane client construction
    pub control_plane: Arc<dyn ControlPlaneFactory>,
}

impl Backends {
    /// Backends talking to the Kubernetes API and ElastiCache.
    pub fn kubernetes(client: Client, config: &OperatorConfig) -> Self {
        Self {
            store: Arc::new(KubeStore::new(client.clone())),
            resolver: Arc::new(ConfigMapStrategyResolver::new(
                client.clone(),
                config.operator_namespace.clone(),
                config.strategy_config_map.clone(),
            )),
            broker: Arc::new(SecretCredentialBroker::new(
                client,
                config.credentials_secret.clone(),
            )),
            control_plane: Arc::new(ElastiCacheFactory),
        }
    }
}

/// Shared context for the controllers
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator configuration
    pub config: Arc<OperatorConfig>,
    /// Collaborators for provisioning and snapshots
    pub backends: Backends,
    /// Event reporter identity
    reporter: Reporter,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    /// Create a new context with Kubernetes and ElastiCache backends
    pub fn new(
        client: Client,
        config: OperatorConfig,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        let backends = Backends::kubernetes(client.clone(), &config);
        Self::with_backends(client, config, backends, health_state)
    }

    /// Create a context with explicit backends
    pub fn with_backends(
        client: Client,
        config: OperatorConfig,
        backends: Backends,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            client,
            config: Arc::new(config),
            backends,
            reporter: Reporter {
                controller: FIELD_MANAGER.into(),
                instance: std::env::var("POD_NAME").ok(),
            },
            health_state,
        }
    }

    /// Build the cluster provisioner
    pub fn provider(&self) -> RedisProvider {
        RedisProvider::new(self.backends.clone(), self.config.clone())
    }

    /// Build the snapshot reconciler
    pub fn snapshot_reconciler(&self) -> SnapshotReconciler {
        SnapshotReconciler::new(self.provider())
    }

    /// Record a Normal event on `resource`.
    pub async fn publish_normal_event<K>(
        &self,
        resource: &K,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) where
        K: Resource<DynamicType = ()>,
    {
        self.publish(resource, EventType::Normal, reason, action, note)
            .await
    }

    /// Record a Warning event on `resource`.
    pub async fn publish_warning_event<K>(
        &self,
        resource: &K,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) where
        K: Resource<DynamicType = ()>,
    {
        self.publish(resource, EventType::Warning, reason, action, note)
            .await
    }

    /// Events are best effort: a failed publish is logged, never returned.
    async fn publish<K>(
        &self,
        resource: &K,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) where
        K: Resource<DynamicType = ()>,
    {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone());
        if let Err(e) = recorder.publish(&event, &resource.object_ref(&())).await {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}
