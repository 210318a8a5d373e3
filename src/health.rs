//! Probe and metrics endpoints.
//!
//! - `/healthz`: liveness, 200 while the process serves requests
//! - `/readyz`: 200 once this replica leads and runs the controllers, with a
//!   JSON body describing leadership and the last successful reconcile
//! - `/metrics`: Prometheus text exposition

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use serde_json::json;
use tracing::{error, info};

/// Prefix of every exported metric.
pub const METRICS_PREFIX: &str = "redis_cloud_operator";

/// Default port of the probe and metrics server.
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Labels identifying one reconciled object.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ObjectLabels {
    pub controller: String,
    pub namespace: String,
    pub name: String,
}

impl EncodeLabelSet for ObjectLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("controller", self.controller.as_str()).encode(encoder.encode_label())?;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels of a phase change: resource kind and the phase entered.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PhaseLabels {
    pub kind: String,
    pub phase: String,
}

impl EncodeLabelSet for PhaseLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("phase", self.phase.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Operator metrics, registered under `METRICS_PREFIX`.
pub struct Metrics {
    reconciliations: Family<ObjectLabels, Counter>,
    reconciliation_errors: Family<ObjectLabels, Counter>,
    reconcile_duration_seconds: Family<ObjectLabels, Histogram>,
    phase_transitions: Family<PhaseLabels, Counter>,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(METRICS_PREFIX);

        let reconciliations = Family::<ObjectLabels, Counter>::default();
        registry.register(
            "reconciliations",
            "Successful reconciliations per object",
            reconciliations.clone(),
        );

        let reconciliation_errors = Family::<ObjectLabels, Counter>::default();
        registry.register(
            "reconciliation_errors",
            "Failed reconciliations per object",
            reconciliation_errors.clone(),
        );

        // 1ms .. ~16s; a pass may include a bounded describe poll
        let reconcile_duration_seconds =
            Family::<ObjectLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "reconcile_duration_seconds",
            "Duration of successful reconciliations",
            reconcile_duration_seconds.clone(),
        );

        let phase_transitions = Family::<PhaseLabels, Counter>::default();
        registry.register(
            "phase_transitions",
            "Phase changes by resource kind and entered phase",
            phase_transitions.clone(),
        );

        Self {
            reconciliations,
            reconciliation_errors,
            reconcile_duration_seconds,
            phase_transitions,
            registry,
        }
    }

    fn object(controller: &str, namespace: &str, name: &str) -> ObjectLabels {
        ObjectLabels {
            controller: controller.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn record_reconcile(&self, controller: &str, namespace: &str, name: &str, duration_secs: f64) {
        let labels = Self::object(controller, namespace, name);
        self.reconciliations.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    pub fn record_error(&self, controller: &str, namespace: &str, name: &str) {
        self.reconciliation_errors
            .get_or_create(&Self::object(controller, namespace, name))
            .inc();
    }

    pub fn record_phase_transition(&self, kind: &str, phase: &str) {
        self.phase_transitions
            .get_or_create(&PhaseLabels {
                kind: kind.to_string(),
                phase: phase.to_string(),
            })
            .inc();
    }

    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

/// State shared between the controllers, leader election and the server.
pub struct HealthState {
    leader: AtomicBool,
    ready: AtomicBool,
    /// Unix seconds of the last successful reconcile, 0 if none yet.
    last_reconcile: AtomicU64,
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// A state that is neither leading nor ready.
    pub fn new() -> Self {
        Self {
            leader: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            last_reconcile: AtomicU64::new(0),
            metrics: Metrics::new(),
        }
    }

    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }

    pub fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Ready means leading with the controllers started.
    pub fn is_ready(&self) -> bool {
        self.is_leader() && self.ready.load(Ordering::SeqCst)
    }

    pub fn mark_reconciled(&self) {
        let now = u64::try_from(jiff::Timestamp::now().as_second()).unwrap_or_default();
        self.last_reconcile.store(now, Ordering::Relaxed);
    }

    /// Unix seconds of the last successful reconcile, if any.
    pub fn last_reconcile(&self) -> Option<u64> {
        match self.last_reconcile.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(secs),
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    let code = if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "ready": state.is_ready(),
        "leader": state.is_leader(),
        "lastReconcile": state.last_reconcile(),
    });
    (code, Json(body)).into_response()
}

async fn metrics(State(state): State<Arc<HealthState>>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Routes of the probe and metrics server.
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve probes and metrics on all interfaces until the listener fails.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(port = port, "Health server listening");
    axum::serve(listener, create_router(state)).await
}
