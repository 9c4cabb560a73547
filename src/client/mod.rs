//! Entry point used by the command layer.
//!
//! [`Client`] owns one backend and turns identifiers into the replacement,
//! deletion, and swap workflows. Each call starts its own deadline.


use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::compute::{ComputeBackend, WaitPolicy, build_backend};
use crate::config::Config;
use crate::constants::DEFAULT_DEADLINE_SECS;
use crate::error::{ClientError, ClientResult, Step};
use crate::replace::{Replacement, ReplacementOrchestrator};
use crate::resolver::{InstanceResolver, NameFilter, RegexFilter};
use crate::swap::{MembershipChange, SwapOrchestrator};

#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn ComputeBackend>,
    wait_policy: WaitPolicy,
    deadline: Duration,
}

impl Client {
    /// Creates a client with default polling and deadline.
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            wait_policy: WaitPolicy::default(),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
        }
    }

    /// Builds the configured backend. Fails if its credentials are incomplete.
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        Ok(Self::new(build_backend(&config.provider)?)
            .with_wait_policy(config.wait_policy())
            .with_deadline(config.deadline))
    }

    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    /// Overall budget for each operation's polling.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ComputeBackend> {
        &self.backend
    }

    /// Replaces the single instance whose name matches the `identifier` regex
    /// with one built from `image`.
    pub async fn replace(&self, identifier: &str, image: &str) -> ClientResult<Replacement> {
        self.replace_matching(&regex_filter(identifier)?, image).await
    }

    /// Like [`replace`](Self::replace) with any name predicate.
    pub async fn replace_matching(
        &self,
        filter: &dyn NameFilter,
        image: &str,
    ) -> ClientResult<Replacement> {
        ReplacementOrchestrator::new(self.backend.clone(), self.invocation_policy())
            .run(filter, image)
            .await
    }

    /// Deletes the single instance whose name matches the `identifier` regex.
    /// Returns its id.
    pub async fn delete(&self, identifier: &str) -> ClientResult<String> {
        let filter = regex_filter(identifier)?;
        let instance = InstanceResolver::new(self.backend.clone())
            .resolve(&filter)
            .await?
            .into_single()?;

        self.backend
            .delete(&instance.instance_id)
            .await
            .map_err(|e| ClientError::mutation(Step::Delete, &instance.instance_id, e))?;
        tracing::info!(instance_id = %instance.instance_id, name = %instance.name, "deleted instance");
        Ok(instance.instance_id)
    }

    /// Makes `instance_ids` the complete membership of `load_balancer`.
    pub async fn swap_load_balancer(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> ClientResult<MembershipChange> {
        SwapOrchestrator::new(self.backend.clone())
            .run(load_balancer, instance_ids)
            .await
    }

    /// A deadline too far out to represent leaves polling bounded by attempts only.
    fn invocation_policy(&self) -> WaitPolicy {
        match Instant::now().checked_add(self.deadline) {
            Some(deadline) => self.wait_policy.with_deadline(deadline),
            None => self.wait_policy,
        }
    }
}

fn regex_filter(identifier: &str) -> ClientResult<RegexFilter> {
    RegexFilter::new(identifier).map_err(|source| ClientError::InvalidFilter {
        filter: identifier.to_string(),
        source,
    })
}
