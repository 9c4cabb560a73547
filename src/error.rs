//! Errors surfaced by the [`Client`](crate::Client) operations.

use std::fmt;

use thiserror::Error;

use crate::compute::{BackendError, WaitError};
use crate::config::MissingCredentialError;

/// Step of an operation, attached to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Resolve,
    Stop,
    WaitStopped,
    Create,
    WaitRunning,
    Delete,
    ReadMembership,
    ValidateMember,
    ApplyMembership,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolve => "resolve",
            Self::Stop => "stop",
            Self::WaitStopped => "wait for stopped",
            Self::Create => "create",
            Self::WaitRunning => "wait for running",
            Self::Delete => "delete",
            Self::ReadMembership => "read membership",
            Self::ValidateMember => "validate member",
            Self::ApplyMembership => "apply membership",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no instance matches {filter}")]
    NoMatch { filter: String },

    #[error("{filter} matches {} instances: {}", .matches.len(), .matches.join(", "))]
    AmbiguousMatch {
        filter: String,
        /// Names of the matched instances.
        matches: Vec<String>,
    },

    #[error("invalid identifier pattern {filter}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: regex::Error,
    },

    #[error("{step} failed for {target}: {source}")]
    BackendQuery {
        step: Step,
        target: String,
        #[source]
        source: BackendError,
    },

    #[error("{step} failed for {instance_id}: {source}")]
    StateTransitionTimeout {
        step: Step,
        instance_id: String,
        #[source]
        source: WaitError,
    },

    #[error("{step} failed for {target}: {source}")]
    BackendMutation {
        step: Step,
        target: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    MissingCredential(#[from] MissingCredentialError),

    #[error("load balancer not found: {load_balancer}")]
    LoadBalancerNotFound { load_balancer: String },

    #[error("cannot add {instance_id} to {load_balancer}: {reason}")]
    BackendMembership {
        load_balancer: String,
        instance_id: String,
        reason: String,
    },

    #[error("refusing to leave {load_balancer} without members")]
    EmptyMembership { load_balancer: String },
}

impl ClientError {
    /// Step the failure happened in, if it came from a backend call.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::BackendQuery { step, .. }
            | Self::StateTransitionTimeout { step, .. }
            | Self::BackendMutation { step, .. } => Some(*step),
            Self::NoMatch { .. } | Self::AmbiguousMatch { .. } | Self::InvalidFilter { .. } => {
                Some(Step::Resolve)
            }
            Self::BackendMembership { .. } | Self::EmptyMembership { .. } => {
                Some(Step::ValidateMember)
            }
            Self::LoadBalancerNotFound { .. } => Some(Step::ReadMembership),
            Self::MissingCredential(_) => None,
        }
    }

    pub(crate) fn query(step: Step, target: &str, source: BackendError) -> Self {
        Self::BackendQuery {
            step,
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn mutation(step: Step, target: &str, source: BackendError) -> Self {
        Self::BackendMutation {
            step,
            target: target.to_string(),
            source,
        }
    }

    /// Maps a failed wait. Query failures inside the wait stay query errors.
    pub(crate) fn wait(step: Step, instance_id: &str, source: WaitError) -> Self {
        match source {
            WaitError::Query(e) => Self::query(step, instance_id, e),
            other => Self::StateTransitionTimeout {
                step,
                instance_id: instance_id.to_string(),
                source: other,
            },
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
