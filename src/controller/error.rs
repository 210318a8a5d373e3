//! Reconciliation errors and how the error policies requeue them.

use std::time::Duration;
use thiserror::Error;

use crate::client::{CloudError, PollTimeout};

/// Everything a reconciliation pass can fail with.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Control plane error
    #[error("Cloud provider error: {0}")]
    Cloud(#[from] CloudError),

    /// Strategy lookup or parsing failed
    #[error("Strategy error: {0}")]
    Strategy(String),

    /// Tenant credentials could not be obtained
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// A bounded poll gave up
    #[error("Timed out after {elapsed:?} waiting for {operation}: {last_error}")]
    Timeout {
        operation: String,
        elapsed: Duration,
        last_error: String,
    },

    /// The referenced cluster was not provisioned by a supported strategy
    #[error("Unsupported deployment strategy: {0}")]
    UnsupportedStrategy(String),

    /// A required object field is unset
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// The object cannot be acted on as written
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Build a timeout error from a poll that gave up.
    pub fn timeout(operation: &str, err: PollTimeout<CloudError>) -> Self {
        Error::Timeout {
            operation: operation.to_string(),
            elapsed: err.elapsed,
            last_error: err.last_error.to_string(),
        }
    }

    /// The Kubernetes object is gone (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Whether a quick requeue can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                matches!(
                    e,
                    kube::Error::Api(api_err)
                        if api_err.code >= 500 || api_err.code == 429 || api_err.code == 409
                ) || matches!(e, kube::Error::Service(_))
            }
            Error::Cloud(_) | Error::Credentials(_) | Error::Timeout { .. } => true,
            Error::Strategy(_)
            | Error::UnsupportedStrategy(_)
            | Error::Validation(_)
            | Error::MissingField(_) => false,
        }
    }

    /// Delay before the error policy requeues the object.
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(30)
        } else {
            // Configuration errors need a human; check back rarely
            Duration::from_secs(300)
        }
    }
}

/// Result of controller operations.
pub type Result<T> = std::result::Result<T, Error>;
