//! Bounded polling for instance state transitions.

use std::time::Duration;

use tokio::time::{self, Instant};

use super::backend::ComputeBackend;
use super::error::WaitError;
use super::model::InstanceState;
use crate::constants::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};

/// How long and how often to poll before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two polls.
    pub interval: Duration,
    /// Polls attempted before failing with [`WaitError::Timeout`].
    pub max_attempts: u32,
    /// Invocation deadline; polling stops when it passes.
    pub deadline: Option<Instant>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            deadline: None,
        }
    }
}

impl WaitPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            deadline: None,
        }
    }

    /// Returns a copy that also stops at `deadline`.
    pub fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Polls `backend.instance_state` until `target` is observed.
///
/// An instance the backend cannot find yet is treated as "not there yet" rather
/// than an error, since freshly created instances may not be listed immediately.
pub async fn poll_for_status<B>(
    backend: &B,
    instance_id: &str,
    target: InstanceState,
    policy: &WaitPolicy,
) -> Result<(), WaitError>
where
    B: ComputeBackend + ?Sized,
{
    let mut last_observed = None;

    for attempt in 1..=policy.max_attempts {
        if policy.deadline_passed() {
            return Err(deadline_exceeded(instance_id, target, last_observed));
        }

        let query = backend.instance_state(instance_id);
        let result = match policy.deadline {
            Some(deadline) => match time::timeout_at(deadline, query).await {
                Ok(result) => result,
                Err(_) => return Err(deadline_exceeded(instance_id, target, last_observed)),
            },
            None => query.await,
        };

        match result {
            Ok(state) => {
                tracing::debug!(
                    instance_id,
                    attempt,
                    state = %state,
                    target = %target,
                    "polled instance state"
                );
                if state.satisfies(target) {
                    return Ok(());
                }
                last_observed = Some(state);
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(instance_id, attempt, "instance not visible yet");
            }
            Err(e) => return Err(WaitError::Query(e)),
        }

        if attempt < policy.max_attempts {
            let pause = match policy.deadline {
                Some(d) => policy.interval.min(d.saturating_duration_since(Instant::now())),
                None => policy.interval,
            };
            time::sleep(pause).await;
        }
    }

    Err(WaitError::Timeout {
        instance_id: instance_id.to_string(),
        target,
        attempts: policy.max_attempts,
        last_observed,
    })
}

fn deadline_exceeded(
    instance_id: &str,
    target: InstanceState,
    last_observed: Option<InstanceState>,
) -> WaitError {
    WaitError::DeadlineExceeded {
        instance_id: instance_id.to_string(),
        target,
        last_observed,
    }
}
