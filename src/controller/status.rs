//! RedisCluster status conditions.
//!
//! Every phase maps to a `Ready` and a `Progressing` condition. A condition
//! keeps its `lastTransitionTime` for as long as its status does not change.

use crate::crd::{ClusterPhase, Condition};

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// `(ready, progressing)` for a phase.
fn condition_states(phase: ClusterPhase) -> (bool, bool) {
    match phase {
        ClusterPhase::Available => (true, false),
        ClusterPhase::Pending | ClusterPhase::Provisioning | ClusterPhase::Deleting => {
            (false, true)
        }
        ClusterPhase::Failed => (false, false),
    }
}

/// Conditions for a phase, carrying over transition times from `previous`.
pub fn cluster_conditions(
    previous: &[Condition],
    phase: ClusterPhase,
    message: &str,
    generation: Option<i64>,
) -> Vec<Condition> {
    let (ready, progressing) = condition_states(phase);
    let reason = phase.to_string();

    [(CONDITION_READY, ready), (CONDITION_PROGRESSING, progressing)]
        .into_iter()
        .map(|(condition_type, status)| {
            let mut condition = Condition::new(condition_type, status, &reason, message, generation);
            if let Some(prev) = find_condition(previous, condition_type) {
                if prev.status == condition.status {
                    condition.last_transition_time = prev.last_transition_time.clone();
                }
            }
            condition
        })
        .collect()
}

pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}
