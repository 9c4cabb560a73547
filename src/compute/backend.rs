use async_trait::async_trait;

use super::error::{BackendResult, WaitError};
use super::model::{InstanceInfo, InstancePage, InstanceState, NamingPolicy};
use super::wait::{WaitPolicy, poll_for_status};

#[async_trait]
/// Cloud compute operations needed to replace instances and swap load balancer membership.
///
/// Instance IDs are whatever the provider uses to address an instance (EC2
/// instance id, ARM resource id). Implementations validate their credentials
/// when constructed.
pub trait ComputeBackend: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &'static str;

    /// How replacements created by this backend are named.
    fn naming_policy(&self) -> NamingPolicy {
        NamingPolicy::ReuseName
    }

    /// Returns one page of instances. Pass the previous page's `next_page` to continue.
    async fn list(&self, page_token: Option<String>) -> BackendResult<InstancePage>;

    /// Returns a fresh snapshot of one instance.
    async fn get_info(&self, instance_id: &str) -> BackendResult<InstanceInfo>;

    /// Returns the current lifecycle state of one instance.
    async fn instance_state(&self, instance_id: &str) -> BackendResult<InstanceState>;

    /// Requests a stop. Backends that merge stop and deallocate do both here.
    async fn stop(&self, instance_id: &str) -> BackendResult<()>;

    /// Requests a stop that also releases the compute reservation.
    async fn deallocate(&self, instance_id: &str) -> BackendResult<()> {
        self.stop(instance_id).await
    }

    /// Creates an instance named `name` from `image`, copying every other
    /// setting from `template`. Returns the new instance id.
    async fn create(
        &self,
        image: &str,
        name: &str,
        template: &InstanceInfo,
    ) -> BackendResult<String>;

    /// Deletes (terminates) an instance.
    async fn delete(&self, instance_id: &str) -> BackendResult<()>;

    /// Blocks until the instance reaches `target` or `policy` is exhausted.
    async fn wait_for_status(
        &self,
        instance_id: &str,
        target: InstanceState,
        policy: &WaitPolicy,
    ) -> Result<(), WaitError> {
        poll_for_status(self, instance_id, target, policy).await
    }

    /// Returns the instance ids registered with a load balancer.
    ///
    /// Fails with [`BackendError::NotFound`](super::BackendError::NotFound) if the
    /// load balancer does not exist.
    async fn load_balancer_members(&self, load_balancer: &str) -> BackendResult<Vec<String>>;

    /// Makes `instance_ids` the complete membership of a load balancer.
    async fn set_load_balancer_members(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> BackendResult<()>;
}
