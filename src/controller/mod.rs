//! Controller module for redis-cloud-operator.
//!
//! Contains the reconciliation loops, the snapshot state machine, error
//! handling, status management and persistence.
//!
//! This module supports two controllers:
//! - RedisCluster controller (`cluster_reconciler` driving `provisioner`)
//! - RedisSnapshot controller (`snapshot_*` modules)

// Shared modules
pub mod common;
pub mod context;
pub mod error;
pub mod status;
pub mod store;

// RedisCluster controller
pub mod cluster_reconciler;
pub mod provisioner;

// RedisSnapshot controller
pub mod snapshot_reconciler;
pub mod snapshot_state_machine;
