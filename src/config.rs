//! Operator configuration read from the process environment.
//!
//! Every setting has a default so the operator starts with an empty
//! environment. Malformed numeric values are logged and replaced by the
//! default rather than aborting startup.

use std::time::Duration;

use tracing::warn;

use crate::client::PollPolicy;
use crate::client::polling::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::health::DEFAULT_HEALTH_PORT;

/// Region used when neither the resource nor the strategy names one.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Name of the ConfigMap holding provisioning strategies.
pub const DEFAULT_STRATEGY_CONFIG_MAP: &str = "cloud-resources-aws-strategies";

/// Name of the Secret holding tenant cloud credentials.
pub const DEFAULT_CREDENTIALS_SECRET: &str = "cloud-resources-aws-credentials";

/// Interval between snapshot status re-checks.
pub const DEFAULT_SNAPSHOT_RECHECK: Duration = Duration::from_secs(60);

/// Runtime configuration for the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace the operator runs in; holds the strategy ConfigMap and the lease.
    pub operator_namespace: String,
    /// Restrict watches to one namespace. `None` watches cluster-wide.
    pub watch_namespace: Option<String>,
    /// Fallback region for control plane calls.
    pub default_region: String,
    /// ConfigMap holding provisioning strategies.
    pub strategy_config_map: String,
    /// Secret holding tenant cloud credentials.
    pub credentials_secret: String,
    /// Polling policy for replication group listing.
    pub poll: PollPolicy,
    /// Requeue interval while a snapshot is not yet complete.
    pub snapshot_recheck_interval: Duration,
    /// Port of the probe and metrics server.
    pub health_port: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: "default".to_string(),
            watch_namespace: None,
            default_region: DEFAULT_REGION.to_string(),
            strategy_config_map: DEFAULT_STRATEGY_CONFIG_MAP.to_string(),
            credentials_secret: DEFAULT_CREDENTIALS_SECRET.to_string(),
            poll: PollPolicy::default(),
            snapshot_recheck_interval: DEFAULT_SNAPSHOT_RECHECK,
            health_port: DEFAULT_HEALTH_PORT,
        }
    }
}

impl OperatorConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a key lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll = PollPolicy::new(
            seconds(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL),
            seconds(&lookup, "POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT),
        );

        Self {
            operator_namespace: non_empty("POD_NAMESPACE").unwrap_or(defaults.operator_namespace),
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            default_region: non_empty("DEFAULT_REGION").unwrap_or(defaults.default_region),
            strategy_config_map: non_empty("STRATEGY_CONFIGMAP")
                .unwrap_or(defaults.strategy_config_map),
            credentials_secret: non_empty("CREDENTIALS_SECRET")
                .unwrap_or(defaults.credentials_secret),
            poll,
            snapshot_recheck_interval: seconds(
                &lookup,
                "SNAPSHOT_RECHECK_SECS",
                DEFAULT_SNAPSHOT_RECHECK,
            ),
            health_port: non_empty("HEALTH_PORT")
                .and_then(|raw| match raw.trim().parse::<u16>() {
                    Ok(port) if port > 0 => Some(port),
                    _ => {
                        warn!(value = %raw, "Invalid HEALTH_PORT, using default");
                        None
                    }
                })
                .unwrap_or(defaults.health_port),
        }
    }
}

/// Parse a positive number of seconds, falling back to `default`.
fn seconds<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!(
                key = %key,
                value = %raw,
                default_secs = default.as_secs(),
                "Invalid duration in environment, using default"
            );
            default
        }
    }
}
