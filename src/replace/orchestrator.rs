use std::sync::Arc;

use chrono::Utc;

use super::naming::derive_replacement_name;
use super::state::{ReplacementState, ReplacementTracker};
use crate::compute::{ComputeBackend, InstanceInfo, InstanceState, NamingPolicy, WaitPolicy};
use crate::error::{ClientError, ClientResult, Step};
use crate::resolver::{InstanceResolver, NameFilter};

/// Outcome of a successful replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub old_instance_id: String,
    pub new_instance_id: String,
    pub new_name: String,
    pub image: String,
}

/// Replaces one instance with a copy built from a new image.
///
/// Steps: resolve (exactly one match), stop, wait for stopped, create from the
/// pre-stop snapshot, wait for running. Any failure ends the run where it
/// happened. The old instance is never restarted and nothing is rolled back.
pub struct ReplacementOrchestrator {
    backend: Arc<dyn ComputeBackend>,
    resolver: InstanceResolver,
    wait_policy: WaitPolicy,
}

impl ReplacementOrchestrator {
    pub fn new(backend: Arc<dyn ComputeBackend>, wait_policy: WaitPolicy) -> Self {
        Self {
            resolver: InstanceResolver::new(backend.clone()),
            backend,
            wait_policy,
        }
    }

    pub async fn run(&self, filter: &dyn NameFilter, image: &str) -> ClientResult<Replacement> {
        let current = self.resolver.resolve(filter).await?.into_single()?;

        let mut tracker = ReplacementTracker::new(&current.instance_id);
        let result = self.replace(&current, image, &mut tracker).await;
        if let Err(e) = &result {
            tracker.fail(e);
        }
        result
    }

    async fn replace(
        &self,
        current: &InstanceInfo,
        image: &str,
        tracker: &mut ReplacementTracker,
    ) -> ClientResult<Replacement> {
        let old_id = current.instance_id.as_str();

        tracker.advance(ReplacementState::Stopping);
        self.backend
            .stop(old_id)
            .await
            .map_err(|e| ClientError::mutation(Step::Stop, old_id, e))?;
        self.backend
            .wait_for_status(old_id, InstanceState::Stopped, &self.wait_policy)
            .await
            .map_err(|e| ClientError::wait(Step::WaitStopped, old_id, e))?;
        tracker.advance(ReplacementState::Stopped);

        let new_name = self.replacement_name(current);
        tracker.advance(ReplacementState::Creating);
        let new_id = self
            .backend
            .create(image, &new_name, current)
            .await
            .map_err(|e| ClientError::mutation(Step::Create, &new_name, e))?;
        tracing::info!(instance_id = %new_id, name = %new_name, image, "created replacement");

        self.backend
            .wait_for_status(&new_id, InstanceState::Running, &self.wait_policy)
            .await
            .map_err(|e| ClientError::wait(Step::WaitRunning, &new_id, e))?;
        tracker.advance(ReplacementState::Running);

        Ok(Replacement {
            old_instance_id: old_id.to_string(),
            new_instance_id: new_id,
            new_name,
            image: image.to_string(),
        })
    }

    fn replacement_name(&self, current: &InstanceInfo) -> String {
        match self.backend.naming_policy() {
            NamingPolicy::ReuseName => current.name.clone(),
            NamingPolicy::Timestamped => derive_replacement_name(&current.name, Utc::now()),
        }
    }
}
