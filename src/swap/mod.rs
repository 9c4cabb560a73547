//! Load balancer membership swap.
//!
//! The target set replaces the current membership as a whole. Every target is
//! checked to be a live instance first, and the change is applied with a single
//! backend call, so an invalid target leaves the balancer untouched.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use futures_util::future::join_all;

use crate::compute::{BackendError, ComputeBackend};
use crate::error::{ClientError, ClientResult, Step};

/// Result of a membership swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    pub load_balancer: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Membership after the swap.
    pub members: Vec<String>,
}

pub struct SwapOrchestrator {
    backend: Arc<dyn ComputeBackend>,
}

impl SwapOrchestrator {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }

    pub async fn run(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> ClientResult<MembershipChange> {
        let target = dedup(instance_ids);
        if target.is_empty() {
            return Err(ClientError::EmptyMembership {
                load_balancer: load_balancer.to_string(),
            });
        }

        let current = self
            .backend
            .load_balancer_members(load_balancer)
            .await
            .map_err(|e| lb_error(e, load_balancer, Step::ReadMembership))?;

        self.validate_members(load_balancer, &target).await?;

        self.backend
            .set_load_balancer_members(load_balancer, &target)
            .await
            .map_err(|e| lb_error(e, load_balancer, Step::ApplyMembership))?;

        let change = MembershipChange {
            load_balancer: load_balancer.to_string(),
            added: target
                .iter()
                .filter(|id| !current.contains(id))
                .cloned()
                .collect(),
            removed: current
                .iter()
                .filter(|id| !target.contains(id))
                .cloned()
                .collect(),
            members: target,
        };
        tracing::info!(
            load_balancer,
            added = ?change.added,
            removed = ?change.removed,
            "swapped load balancer membership"
        );
        Ok(change)
    }

    async fn validate_members(&self, load_balancer: &str, target: &[String]) -> ClientResult<()> {
        let lookups = join_all(target.iter().map(|id| self.backend.get_info(id))).await;

        for (id, lookup) in target.iter().zip(lookups) {
            let reason = match lookup {
                Ok(info) if info.state.is_live() => continue,
                Ok(info) => format!("instance is {}", info.state),
                Err(e) if e.is_not_found() => "instance not found".to_string(),
                Err(e) => e.to_string(),
            };
            return Err(ClientError::BackendMembership {
                load_balancer: load_balancer.to_string(),
                instance_id: id.clone(),
                reason,
            });
        }
        Ok(())
    }
}

fn lb_error(err: BackendError, load_balancer: &str, step: Step) -> ClientError {
    match err {
        BackendError::NotFound {
            kind: "load balancer",
            ..
        } => ClientError::LoadBalancerNotFound {
            load_balancer: load_balancer.to_string(),
        },
        other if step == Step::ReadMembership => ClientError::query(step, load_balancer, other),
        other => ClientError::mutation(step, load_balancer, other),
    }
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}
