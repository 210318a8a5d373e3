//! State machine for RedisSnapshot phase transitions.
//!
//! Phases only move forward: nothing returns to `Pending` and nothing leaves
//! `Complete`. `Failed` is not terminal; a later pass that observes a healthy
//! cluster moves the snapshot on to `InProgress` or `Complete`.

use crate::client::SnapshotStatus;
use crate::crd::SnapshotPhase;

// ============================================================================
// Snapshot Events
// ============================================================================

/// Events that can trigger snapshot phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotEvent {
    /// No snapshot exists yet; a create call is issued.
    SnapshotRequested,

    /// The snapshot exists but is not yet available.
    SnapshotCreating,

    /// The snapshot is available.
    SnapshotAvailable,

    /// The replication group is missing, not available or has no primary.
    ClusterUnavailable,

    /// The pass could not make progress (lookup or configuration failure).
    ReconcileFailed,
}

impl std::fmt::Display for SnapshotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotEvent::SnapshotRequested => write!(f, "SnapshotRequested"),
            SnapshotEvent::SnapshotCreating => write!(f, "SnapshotCreating"),
            SnapshotEvent::SnapshotAvailable => write!(f, "SnapshotAvailable"),
            SnapshotEvent::ClusterUnavailable => write!(f, "ClusterUnavailable"),
            SnapshotEvent::ReconcileFailed => write!(f, "ReconcileFailed"),
        }
    }
}

/// What a pass observed on the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotObservation {
    /// Whether the replication group can be snapshotted or is being snapshotted.
    pub cluster_available: bool,

    /// Status of the snapshot, if it exists.
    pub snapshot_status: Option<SnapshotStatus>,
}

// ============================================================================
// Snapshot Transition
// ============================================================================

/// Represents a single state transition.
#[derive(Debug, Clone)]
pub struct SnapshotTransition {
    /// Source phase.
    pub from: SnapshotPhase,

    /// Target phase.
    pub to: SnapshotPhase,

    /// Event that triggers this transition.
    pub event: SnapshotEvent,

    /// Human-readable description.
    pub description: &'static str,
}

// ============================================================================
// Snapshot State Machine
// ============================================================================

/// State machine for validating RedisSnapshot phase transitions.
#[derive(Debug, Clone)]
pub struct SnapshotStateMachine {
    /// All valid transitions.
    transitions: Vec<SnapshotTransition>,
}

impl Default for SnapshotStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStateMachine {
    /// Create a new state machine with all valid transitions.
    pub fn new() -> Self {
        let mut transitions = Vec::new();

        // Every non-terminal phase reacts to events the same way.
        for from in [
            SnapshotPhase::Pending,
            SnapshotPhase::InProgress,
            SnapshotPhase::Failed,
        ] {
            transitions.extend([
                SnapshotTransition {
                    from,
                    to: SnapshotPhase::InProgress,
                    event: SnapshotEvent::SnapshotRequested,
                    description: "Snapshot creation requested",
                },
                SnapshotTransition {
                    from,
                    to: SnapshotPhase::InProgress,
                    event: SnapshotEvent::SnapshotCreating,
                    description: "Snapshot is being created",
                },
                SnapshotTransition {
                    from,
                    to: SnapshotPhase::Complete,
                    event: SnapshotEvent::SnapshotAvailable,
                    description: "Snapshot is available",
                },
                SnapshotTransition {
                    from,
                    to: SnapshotPhase::Failed,
                    event: SnapshotEvent::ClusterUnavailable,
                    description: "Replication group cannot be snapshotted",
                },
                SnapshotTransition {
                    from,
                    to: SnapshotPhase::Failed,
                    event: SnapshotEvent::ReconcileFailed,
                    description: "Reconciliation failed",
                },
            ]);
        }

        Self { transitions }
    }

    /// Find the transition for an event in the given phase.
    ///
    /// Returns `None` if the event is not valid in that phase.
    pub fn transition(&self, from: SnapshotPhase, event: SnapshotEvent) -> Option<SnapshotTransition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.event == event)
            .cloned()
    }
}

/// Derive the event for what a pass observed.
///
/// Cluster availability gates everything else: an existing snapshot is only
/// trusted while its replication group is usable.
pub fn determine_snapshot_event(observation: &SnapshotObservation) -> SnapshotEvent {
    if !observation.cluster_available {
        return SnapshotEvent::ClusterUnavailable;
    }

    match &observation.snapshot_status {
        None => SnapshotEvent::SnapshotRequested,
        Some(status) if status.is_available() => SnapshotEvent::SnapshotAvailable,
        Some(_) => SnapshotEvent::SnapshotCreating,
    }
}
