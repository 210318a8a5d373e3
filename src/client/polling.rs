//! Bounded polling for control plane calls that may not succeed right away.
//!
//! Freshly issued credentials can take a while to be accepted by the control
//! plane, so early calls fail even though nothing is wrong. `poll_immediate`
//! runs an operation once straight away and then on a fixed interval,
//! treating every error as "not ready yet", until it succeeds or the policy's
//! timeout is exhausted.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default interval between attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on the total time spent polling.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval and deadline of a polling loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Time to wait between two attempts.
    pub interval: Duration,
    /// Maximum time from the first attempt after which polling gives up.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollPolicy {
    /// Create a policy with the given interval and timeout.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Polling gave up before the operation succeeded.
#[derive(Error, Debug)]
#[error("gave up after {elapsed:?} and {attempts} attempts: {last_error}")]
pub struct PollTimeout<E> {
    /// Time spent polling.
    pub elapsed: Duration,
    /// Number of attempts made.
    pub attempts: u32,
    /// Error returned by the last attempt.
    pub last_error: E,
}

/// Run `operation` until it succeeds or `policy.timeout` would be exceeded.
///
/// The first attempt runs immediately. Another attempt is only started if it
/// can begin within the timeout, so the loop never sleeps past the deadline.
pub async fn poll_immediate<F, Fut, T, E>(
    policy: &PollPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, PollTimeout<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        operation = %operation_name,
                        attempts = attempts,
                        "Operation succeeded after polling"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                let elapsed = started.elapsed();
                if elapsed + policy.interval > policy.timeout {
                    warn!(
                        operation = %operation_name,
                        attempts = attempts,
                        elapsed_secs = elapsed.as_secs(),
                        error = %e,
                        "Giving up polling"
                    );
                    return Err(PollTimeout {
                        elapsed,
                        attempts,
                        last_error: e,
                    });
                }

                debug!(
                    operation = %operation_name,
                    attempt = attempts,
                    error = %e,
                    "Operation not ready, polling again"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}
