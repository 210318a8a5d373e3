//! Collaborators that resolve what to provision and with which credentials.
//!
//! - `strategy`: tier to provisioning strategy lookup (ConfigMap backed)
//! - `credentials`: tenant credential issuance (Secret backed)
//! - `naming`: stable external names derived from object identity

pub mod credentials;
pub mod naming;
pub mod strategy;

use async_trait::async_trait;

use crate::client::ProviderCredentials;
use crate::controller::error::Result;

pub use credentials::SecretCredentialBroker;
pub use naming::snapshot_name;
pub use strategy::{ConfigMapStrategyResolver, StrategyConfig};

/// Resource class under which Redis strategies are stored.
pub const REDIS_RESOURCE_TYPE: &str = "redis";

/// Deployment strategy recorded on clusters provisioned by this operator.
pub const AWS_DEPLOYMENT_STRATEGY: &str = "aws";

/// Resolves a (resource class, tier) pair into a provisioning strategy.
#[async_trait]
pub trait StrategyResolver: Send + Sync {
    async fn resolve(&self, resource_type: &str, tier: &str) -> Result<StrategyConfig>;
}

/// Issues cloud provider credentials for a tenant namespace.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn issue_credentials(&self, tenant: &str) -> Result<ProviderCredentials>;
}
