use std::time::Duration;

use thiserror::Error;

use super::model::InstanceState;

#[derive(Debug, Error)]
/// Errors returned by compute backend operations.
pub enum BackendError {
    /// The provider CLI could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The provider CLI exited unsuccessfully.
    #[error("{label} failed: {stderr}")]
    CommandFailed {
        /// Command description.
        label: String,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The provider CLI did not finish in time.
    #[error("{label} timed out after {timeout:?}")]
    CommandTimedOut {
        /// Command description.
        label: String,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// An HTTP request could not be completed.
    #[error("request to {url} failed: {message}")]
    Http {
        /// Request URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// The provider answered with a non-success status.
    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// Service-principal token acquisition failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A provider response did not have the expected shape.
    #[error("failed to parse {what}: {message}")]
    Parse {
        /// What was being parsed.
        what: &'static str,
        /// Error message.
        message: String,
    },

    /// The referenced resource does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Resource kind (`instance`, `load balancer`).
        kind: &'static str,
        /// Resource identifier.
        id: String,
    },

    /// A membership change stopped after some instances were already registered.
    #[error(
        "membership of {load_balancer} partially applied (registered {}): {source}",
        .registered.join(", ")
    )]
    PartialMembership {
        /// Load balancer name.
        load_balancer: String,
        /// Instances registered before the failure.
        registered: Vec<String>,
        #[source]
        source: Box<BackendError>,
    },

    /// The backend has no implementation for the operation.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        /// Backend name.
        backend: &'static str,
        /// Operation name.
        operation: &'static str,
    },
}

impl BackendError {
    /// Returns `true` for [`BackendError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
/// Why a wait for an instance state ended without reaching it.
pub enum WaitError {
    /// All polling attempts were used up.
    #[error(
        "instance {instance_id} did not reach {target} after {attempts} attempts (last observed: {})",
        describe_observed(.last_observed)
    )]
    Timeout {
        instance_id: String,
        target: InstanceState,
        attempts: u32,
        last_observed: Option<InstanceState>,
    },

    /// The invocation deadline passed while polling.
    #[error("deadline reached while waiting for instance {instance_id} to reach {target}")]
    DeadlineExceeded {
        instance_id: String,
        target: InstanceState,
        last_observed: Option<InstanceState>,
    },

    /// A state query failed.
    #[error(transparent)]
    Query(#[from] BackendError),
}

impl WaitError {
    /// Returns `true` if the wait gave up rather than failing a query.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DeadlineExceeded { .. })
    }
}

fn describe_observed(state: &Option<InstanceState>) -> String {
    state.map_or_else(|| "nothing".to_string(), |s| s.to_string())
}
