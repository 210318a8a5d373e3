// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Unit tests for redis-cloud-operator.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation.

mod crd_tests {
    use redis_cloud_operator::crd::{ClusterPhase, Condition, RedisClusterSpec, SnapshotPhase};

    #[test]
    fn test_phase_display() {
        assert_eq!(ClusterPhase::Pending.to_string(), "Pending");
        assert_eq!(ClusterPhase::Provisioning.to_string(), "Provisioning");
        assert_eq!(ClusterPhase::Available.to_string(), "Available");
        assert_eq!(ClusterPhase::Deleting.to_string(), "Deleting");
        assert_eq!(ClusterPhase::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_phase_default() {
        assert_eq!(ClusterPhase::default(), ClusterPhase::Pending);
        assert_eq!(SnapshotPhase::default(), SnapshotPhase::Pending);
    }

    #[test]
    fn test_only_complete_is_terminal() {
        assert!(SnapshotPhase::Complete.is_terminal());
        assert!(!SnapshotPhase::Failed.is_terminal());
        assert!(!SnapshotPhase::Pending.is_terminal());
        assert!(!SnapshotPhase::InProgress.is_terminal());
    }

    #[test]
    fn test_cluster_spec_region_is_optional() {
        let spec: RedisClusterSpec = serde_json::from_str(r#"{"tier":"development"}"#).unwrap();
        assert_eq!(spec.tier, "development");
        assert!(spec.region.is_none());
    }

    #[test]
    fn test_condition_status_strings() {
        let ready = Condition::new("Ready", true, "Available", "Replication group available", Some(1));
        assert_eq!(ready.r#type, "Ready");
        assert_eq!(ready.status, "True");
        assert_eq!(ready.reason, "Available");
        assert_eq!(ready.observed_generation, Some(1));

        let progressing = Condition::new("Progressing", false, "Available", "done", None);
        assert_eq!(progressing.status, "False");
    }
}

mod client_tests {
    use redis_cloud_operator::client::{CloudError, ReplicationGroupStatus, SnapshotStatus};

    #[test]
    fn test_fault_classification() {
        let not_found = CloudError::new("ReplicationGroupNotFoundFault", "not found");
        assert!(not_found.is_replication_group_not_found());
        assert!(!not_found.is_replication_group_already_exists());

        let exists = CloudError::new("ReplicationGroupAlreadyExists", "exists");
        assert!(exists.is_replication_group_already_exists());

        let snapshot_exists = CloudError::new("SnapshotAlreadyExistsFault", "exists");
        assert!(snapshot_exists.is_snapshot_already_exists());
        assert!(!snapshot_exists.is_snapshot_not_found());

        let transport = CloudError::transport("connection reset");
        assert!(!transport.is_replication_group_not_found());
        assert!(transport.to_string().contains("connection reset"));
    }

    #[test]
    fn test_only_available_counts() {
        assert!(ReplicationGroupStatus::parse("available").is_available());
        for status in ["creating", "modifying", "deleting", "create-failed", "snapshotting"] {
            assert!(!ReplicationGroupStatus::parse(status).is_available());
        }
        assert!(SnapshotStatus::parse("available").is_available());
        assert!(!SnapshotStatus::parse("creating").is_available());
    }
}

mod config_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use redis_cloud_operator::OperatorConfig;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::from_lookup(lookup(&[]));
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.default_region, "eu-west-1");
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.timeout, Duration::from_secs(300));
        assert_eq!(config.snapshot_recheck_interval, Duration::from_secs(60));
        assert!(config.watch_namespace.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = OperatorConfig::from_lookup(lookup(&[
            ("WATCH_NAMESPACE", "tenants"),
            ("DEFAULT_REGION", "us-west-2"),
            ("POLL_INTERVAL_SECS", "2"),
            ("POLL_TIMEOUT_SECS", "30"),
        ]));
        assert_eq!(config.watch_namespace.as_deref(), Some("tenants"));
        assert_eq!(config.default_region, "us-west-2");
        assert_eq!(config.poll.interval, Duration::from_secs(2));
        assert_eq!(config.poll.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_malformed_durations_fall_back() {
        let config = OperatorConfig::from_lookup(lookup(&[
            ("POLL_INTERVAL_SECS", "soon"),
            ("SNAPSHOT_RECHECK_SECS", "0"),
        ]));
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.snapshot_recheck_interval, Duration::from_secs(60));
    }
}

mod error_tests {
    use std::time::Duration;

    use redis_cloud_operator::client::CloudError;
    use redis_cloud_operator::controller::error::Error;

    #[test]
    fn test_error_is_retryable() {
        let kube_err = Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "timeout".to_string(),
            reason: "Timeout".to_string(),
            code: 504,
        }));
        assert!(kube_err.is_retryable());

        let cloud_err = Error::Cloud(CloudError::new("Throttling", "rate exceeded"));
        assert!(cloud_err.is_retryable());

        let strategy_err = Error::Strategy("no strategy found".to_string());
        assert!(!strategy_err.is_retryable());

        let unsupported = Error::UnsupportedStrategy("openshift".to_string());
        assert!(!unsupported.is_retryable());
    }

    #[test]
    fn test_requeue_after() {
        let conflict = Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert_eq!(conflict.requeue_after(), Duration::from_secs(30));
        assert_eq!(
            Error::Validation("bad".to_string()).requeue_after(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_not_found() {
        let err = Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "redisclusters \"foo\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        }));
        assert!(err.is_not_found());
        assert!(!Error::Validation("x".to_string()).is_not_found());
    }
}

mod status_tests {
    use redis_cloud_operator::controller::status::{
        CONDITION_PROGRESSING, CONDITION_READY, cluster_conditions, find_condition,
    };
    use redis_cloud_operator::crd::{ClusterPhase, Condition};

    fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
        find_condition(conditions, condition_type).is_some_and(|c| c.status == "True")
    }

    #[test]
    fn test_cluster_conditions_follow_phase() {
        let available = cluster_conditions(&[], ClusterPhase::Available, "ok", Some(1));
        assert!(is_condition_true(&available, CONDITION_READY));
        assert!(!is_condition_true(&available, CONDITION_PROGRESSING));

        let deleting = cluster_conditions(&[], ClusterPhase::Deleting, "deleting", Some(1));
        assert!(!is_condition_true(&deleting, CONDITION_READY));
        assert!(is_condition_true(&deleting, CONDITION_PROGRESSING));

        let failed = cluster_conditions(&[], ClusterPhase::Failed, "boom", Some(1));
        assert!(!is_condition_true(&failed, CONDITION_READY));
        assert!(!is_condition_true(&failed, CONDITION_PROGRESSING));
    }

    #[test]
    fn test_conditions_replace_previous_of_same_type() {
        let previous = cluster_conditions(&[], ClusterPhase::Provisioning, "creating", Some(1));
        let next = cluster_conditions(&previous, ClusterPhase::Available, "ready", Some(2));

        assert_eq!(next.len(), 2);
        let ready = find_condition(&next, CONDITION_READY).unwrap();
        assert_eq!(ready.message, "ready");
        assert_eq!(ready.observed_generation, Some(2));
    }

    #[test]
    fn test_is_condition_true_missing() {
        let conditions: Vec<Condition> = vec![];
        assert!(!is_condition_true(&conditions, "Ready"));
    }
}
