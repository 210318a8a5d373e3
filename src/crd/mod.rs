//! Custom Resource Definitions (CRDs) for redis-cloud-operator.
//!
//! - `RedisCluster`: Provision and delete a managed Redis replication group
//! - `RedisSnapshot`: Capture a snapshot of a RedisCluster's primary node

mod redis_cluster;
mod redis_snapshot;

pub use redis_cluster::*;
pub use redis_snapshot::*;
