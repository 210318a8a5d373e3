//! redis-cloud-operator library crate
//!
//! This module exports the controllers, CRD definitions, the control plane
//! client and the strategy/credential collaborators.

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod providers;

pub use config::OperatorConfig;
pub use health::HealthState;

use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use kube::runtime::controller::{Action, Error as ControllerError};
use kube::runtime::reflector::{Lookup, ObjectRef};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, predicates, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use controller::context::Context;
use controller::error::Error;
use controller::{cluster_reconciler, snapshot_reconciler};
use crd::{RedisCluster, RedisSnapshot};

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Watcher configuration shared by both controllers.
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Reflector-backed stream of applied objects.
///
/// Watch errors are retried with backoff. Status-only updates are dropped by
/// the generation predicate, so our own status writes do not retrigger a
/// pass; periodic requeues drive progress instead.
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// Log one controller result. A missing object after deletion is expected
/// and only logged at debug.
fn log_reconcile_result<K: Lookup>(
    kind: &str,
    result: Result<(ObjectRef<K>, Action), ControllerError<Error, watcher::Error>>,
) {
    let err = match result {
        Ok((obj, action)) => {
            debug!(kind = %kind, name = %obj.name, ?action, "Reconciled");
            return;
        }
        Err(err) => err,
    };
    let gone = match &err {
        ControllerError::ObjectNotFound(_) => true,
        ControllerError::ReconcilerFailed(e, _) => e.is_not_found(),
        _ => false,
    };
    if gone {
        debug!(kind = %kind, error = ?err, "Object already deleted");
    } else {
        error!(kind = %kind, error = ?err, "Reconciliation failed");
    }
}

/// Watch `api` and run `reconcile` for every applied object until the watch ends.
async fn run_controller<K, F, Fut, P>(
    kind: &'static str,
    api: Api<K>,
    reconcile: F,
    error_policy: P,
    ctx: Arc<Context>,
) where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
    F: FnMut(Arc<K>, Arc<Context>) -> Fut,
    Fut: Future<Output = Result<Action, Error>> + Send + 'static,
    P: Fn(Arc<K>, &Error, Arc<Context>) -> Action,
{
    let (reader, stream) = create_filtered_stream(api, default_watcher_config());
    Controller::for_stream(stream, reader)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move { log_reconcile_result(kind, result) })
        .await;
    error!(kind = %kind, "Controller stream ended unexpectedly");
}

/// Run the RedisCluster and RedisSnapshot controllers side by side.
///
/// Both share one `Context`. Watches are cluster-wide unless
/// `config.watch_namespace` is set. Metrics are recorded when a health state
/// is given.
pub async fn run_controllers(
    client: Client,
    config: OperatorConfig,
    health_state: Option<Arc<HealthState>>,
) {
    let namespace = config.watch_namespace.clone();
    info!(
        scope = namespace.as_deref().unwrap_or("cluster-wide"),
        "Starting RedisCluster and RedisSnapshot controllers"
    );

    let clusters: Api<RedisCluster> = scoped_api(client.clone(), namespace.as_deref());
    let snapshots: Api<RedisSnapshot> = scoped_api(client.clone(), namespace.as_deref());

    if let Some(ref state) = health_state {
        state.set_ready(true);
    }
    let ctx = Arc::new(Context::new(client, config, health_state));

    futures::join!(
        run_controller(
            "RedisCluster",
            clusters,
            cluster_reconciler::reconcile,
            cluster_reconciler::error_policy,
            ctx.clone(),
        ),
        run_controller(
            "RedisSnapshot",
            snapshots,
            snapshot_reconciler::reconcile,
            snapshot_reconciler::error_policy,
            ctx,
        ),
    );
}
