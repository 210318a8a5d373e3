//! Provisioning strategies stored in a ConfigMap.
//!
//! The ConfigMap has one key per resource class. Each value is a JSON object
//! mapping tier names to a strategy:
//!
//! ```json
//! {
//!   "development": { "region": "eu-west-1", "createStrategy": {} },
//!   "production": {
//!     "region": "eu-west-1",
//!     "createStrategy": { "CacheNodeType": "cache.m5.large", "NumCacheClusters": 3 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::StrategyResolver;
use crate::controller::error::{Error, Result};

/// A provisioning strategy for one tier.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    /// Region to provision in. Empty means "not specified".
    #[serde(default)]
    pub region: String,

    /// Provider-specific create parameters, decoded by the provisioner.
    #[serde(default)]
    pub create_strategy: serde_json::Value,
}

/// Parse the strategies stored under one resource class.
pub fn parse_strategies(raw: &str) -> Result<BTreeMap<String, StrategyConfig>> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Strategy(format!("failed to parse strategy config: {}", e)))
}

/// Select the strategy for a tier from a ConfigMap's data.
pub fn select_strategy(
    data: &BTreeMap<String, String>,
    resource_type: &str,
    tier: &str,
) -> Result<StrategyConfig> {
    let not_found = || {
        Error::Strategy(format!(
            "no strategy found for resource type {} and tier {}",
            resource_type, tier
        ))
    };

    let raw = data.get(resource_type).ok_or_else(not_found)?;
    let mut strategies = parse_strategies(raw)?;
    strategies.remove(tier).ok_or_else(not_found)
}

/// A missing ConfigMap is a configuration error; any other failure is the
/// API's and stays retryable.
fn config_map_read_error(err: kube::Error, namespace: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(e) if e.code == 404 => Error::Strategy(format!(
            "strategy config map {}/{} not found",
            namespace, name
        )),
        other => Error::Kube(other),
    }
}

/// Resolves strategies from a ConfigMap in the operator's namespace.
#[derive(Clone)]
pub struct ConfigMapStrategyResolver {
    client: Client,
    namespace: String,
    name: String,
}

impl ConfigMapStrategyResolver {
    pub fn new(client: Client, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl StrategyResolver for ConfigMapStrategyResolver {
    async fn resolve(&self, resource_type: &str, tier: &str) -> Result<StrategyConfig> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let config_map = api
            .get(&self.name)
            .await
            .map_err(|e| config_map_read_error(e, &self.namespace, &self.name))?;

        debug!(
            config_map = %self.name,
            resource_type = %resource_type,
            tier = %tier,
            "Resolving strategy"
        );

        select_strategy(&config_map.data.unwrap_or_default(), resource_type, tier)
    }
}
