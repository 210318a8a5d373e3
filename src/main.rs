//! redis-cloud-operator entry point.
//!
//! Startup order: JSON logging, configuration from the environment, the
//! Kubernetes client, the probe server (served before leadership so liveness
//! works on standby replicas), leader election, then both controllers.

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use redis_cloud_operator::OperatorConfig;
use redis_cloud_operator::health::{HealthState, run_health_server};
use redis_cloud_operator::run_controllers;

const LEASE_NAME: &str = "redis-cloud-operator-leader";
const LEASE_TTL: Duration = Duration::from_secs(15);
const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(5);

/// Time given to in-flight passes after a shutdown signal.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;
    info!("Starting redis-cloud-operator");

    let config = OperatorConfig::from_env();
    info!(
        operator_namespace = %config.operator_namespace,
        default_region = %config.default_region,
        strategy_config_map = %config.strategy_config_map,
        credentials_secret = %config.credentials_secret,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("cluster-wide"),
        poll_interval_secs = config.poll.interval.as_secs(),
        poll_timeout_secs = config.poll.timeout.as_secs(),
        "Loaded operator configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!(error = %e, "Health server failed");
            }
        })
    };

    let holder_id = holder_identity();
    let lease = lease_lock(&client, &config.operator_namespace, &holder_id);
    info!(
        holder_id = %holder_id,
        namespace = %config.operator_namespace,
        lease_name = LEASE_NAME,
        "Waiting for leadership"
    );
    acquire_leadership(&lease).await;
    health_state.set_leader(true);
    let renewal_handle = keep_leadership(lease, health_state.clone());

    let controller_handle = {
        let health_state = health_state.clone();
        tokio::spawn(run_controllers(client, config, Some(health_state)))
    };

    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!(error = %e, "Controller task panicked");
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!(error = %e, "Health server task panicked");
            }
        }
        // Renewal only returns by panicking; losing the lease exits the process
        Err(e) = renewal_handle => {
            error!(error = %e, "Lease renewal task panicked");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            health_state.set_ready(false);
            info!(
                grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                "Waiting for in-flight reconciliations"
            );
            tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// JSON logs filtered by `RUST_LOG`, with info for the operator and kube.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("redis_cloud_operator=info".parse()?)
        .add_directive("kube=info".parse()?)
        .add_directive("kube_leader_election=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();
    Ok(())
}

/// Lease holder identity: the pod name, else the hostname.
fn holder_identity() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| {
        warn!("POD_NAME not set, using hostname");
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    })
}

fn lease_lock(client: &Client, namespace: &str, holder_id: &str) -> LeaseLock {
    LeaseLock::new(
        client.clone(),
        namespace,
        LeaseLockParams {
            holder_id: holder_id.to_string(),
            lease_name: LEASE_NAME.to_string(),
            lease_ttl: LEASE_TTL,
        },
    )
}

/// Block until this replica holds the lease.
async fn acquire_leadership(lease: &LeaseLock) {
    loop {
        match lease.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("Acquired leadership");
                return;
            }
            Ok(_) => info!("Another replica is leading, waiting"),
            Err(e) => warn!(error = %e, "Failed to acquire lease, retrying"),
        }
        tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
    }
}

/// Renew the lease forever; exit the process as soon as it is lost so the
/// pod restarts and rejoins the election.
#[allow(clippy::exit)]
fn keep_leadership(lease: LeaseLock, health_state: Arc<HealthState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
            let lost = match lease.try_acquire_or_renew().await {
                Ok(result) => !result.acquired_lease,
                Err(e) => {
                    error!(error = %e, "Failed to renew lease");
                    true
                }
            };
            if lost {
                error!("Lost leadership, exiting");
                health_state.set_leader(false);
                std::process::exit(1);
            }
        }
    })
}

/// Resolve on SIGINT or SIGTERM.
///
/// Failing to install a handler leaves no way to shut down gracefully, so it
/// aborts startup.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
