// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for replication group provisioning and snapshots.
//!
//! These tests drive `RedisProvider` and `SnapshotReconciler` through whole
//! create, delete and snapshot lifecycles WITHOUT a live Kubernetes cluster
//! or cloud account. The control plane, object store, strategy resolver and
//! credential broker are in-memory fakes that record every call.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_snapshot_lifecycle
//!
//! # Run with verbose output
//! cargo test --test functional -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! - **Provisioner tests**: create passes, idempotence, finalizer ordering,
//!   delete convergence and bounded polling
//! - **Snapshot tests**: phase progression, failure reporting and recovery

mod snapshot_tests;

pub use mock_backends::*;
