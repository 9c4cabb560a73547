//! In-memory [`ComputeBackend`] for tests.
//!
//! Transitional states settle one poll after they are first observed, so
//! `Stopping` reads once and then `Stopped`. Every call is recorded in order.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::ComputeBackend;
use super::error::{BackendError, BackendResult, WaitError};
use super::model::{BlockDeviceMapping, InstanceInfo, InstancePage, InstanceState, NamingPolicy};
use super::wait::{WaitPolicy, poll_for_status};

const DEFAULT_PAGE_SIZE: usize = 50;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    List {
        page_token: Option<String>,
    },
    GetInfo(String),
    InstanceState(String),
    Stop(String),
    Deallocate(String),
    Create {
        image: String,
        name: String,
        template: InstanceInfo,
    },
    Delete(String),
    WaitForStatus {
        instance_id: String,
        target: InstanceState,
    },
    LoadBalancerMembers(String),
    SetLoadBalancerMembers {
        load_balancer: String,
        instance_ids: Vec<String>,
    },
}

impl BackendCall {
    /// Returns `true` for calls that change cloud state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Stop(_)
                | Self::Deallocate(_)
                | Self::Create { .. }
                | Self::Delete(_)
                | Self::SetLoadBalancerMembers { .. }
        )
    }
}

#[derive(Default)]
struct MockState {
    instances: Vec<InstanceInfo>,
    load_balancers: HashMap<String, Vec<String>>,
    calls: Vec<BackendCall>,
    /// Instances whose transitional state never settles.
    stalled: HashSet<String>,
    /// Remaining state queries for which a created instance is not visible.
    hidden: HashMap<String, u32>,
    failing_page: Option<usize>,
    failing_operations: HashSet<&'static str>,
    next_id: u32,
}

/// Scriptable in-memory backend.
pub struct MockComputeBackend {
    state: Mutex<MockState>,
    page_size: usize,
    naming: NamingPolicy,
    hide_created_for: u32,
}

impl Default for MockComputeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockComputeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            page_size: DEFAULT_PAGE_SIZE,
            naming: NamingPolicy::ReuseName,
            hide_created_for: 0,
        }
    }

    /// Adds an instance. Listing order follows insertion order.
    pub fn with_instance(self, instance: InstanceInfo) -> Self {
        self.state.lock().instances.push(instance);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_naming_policy(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_load_balancer(self, name: &str, members: &[&str]) -> Self {
        self.state.lock().load_balancers.insert(
            name.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Keeps `instance_id` in its transitional state forever.
    pub fn stall(self, instance_id: &str) -> Self {
        self.state.lock().stalled.insert(instance_id.to_string());
        self
    }

    /// Makes created instances invisible to the next `polls` state queries.
    pub fn hide_created_for(mut self, polls: u32) -> Self {
        self.hide_created_for = polls;
        self
    }

    /// Makes listing page `index` (zero based) fail.
    pub fn fail_page(self, index: usize) -> Self {
        self.state.lock().failing_page = Some(index);
        self
    }

    /// Makes every call to `operation` (trait method name) fail.
    pub fn fail_on(self, operation: &'static str) -> Self {
        self.state.lock().failing_operations.insert(operation);
        self
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded calls that changed state.
    pub fn mutating_calls(&self) -> Vec<BackendCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn instance(&self, instance_id: &str) -> Option<InstanceInfo> {
        self.state
            .lock()
            .instances
            .iter()
            .find(|i| i.instance_id == instance_id)
            .cloned()
    }

    pub fn load_balancer(&self, name: &str) -> Option<Vec<String>> {
        self.state.lock().load_balancers.get(name).cloned()
    }

    fn record(&self, call: BackendCall, operation: &'static str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing_operations.contains(operation) {
            return Err(BackendError::CommandFailed {
                label: format!("mock {operation}"),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn update<T>(
        &self,
        instance_id: &str,
        f: impl FnOnce(&mut InstanceInfo) -> T,
    ) -> BackendResult<T> {
        let mut state = self.state.lock();
        state
            .instances
            .iter_mut()
            .find(|i| i.instance_id == instance_id && i.state != InstanceState::Terminated)
            .map(f)
            .ok_or_else(|| instance_not_found(instance_id))
    }
}

fn instance_not_found(instance_id: &str) -> BackendError {
    BackendError::NotFound {
        kind: "instance",
        id: instance_id.to_string(),
    }
}

fn lb_not_found(load_balancer: &str) -> BackendError {
    BackendError::NotFound {
        kind: "load balancer",
        id: load_balancer.to_string(),
    }
}

fn settled(state: InstanceState) -> InstanceState {
    match state {
        InstanceState::Pending => InstanceState::Running,
        InstanceState::Stopping => InstanceState::Stopped,
        InstanceState::Deallocating => InstanceState::Deallocated,
        InstanceState::ShuttingDown => InstanceState::Terminated,
        other => other,
    }
}

#[async_trait]
impl ComputeBackend for MockComputeBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn naming_policy(&self) -> NamingPolicy {
        self.naming
    }

    async fn list(&self, page_token: Option<String>) -> BackendResult<InstancePage> {
        self.record(
            BackendCall::List {
                page_token: page_token.clone(),
            },
            "list",
        )?;

        let start: usize = match &page_token {
            Some(token) => token.parse().map_err(|_| BackendError::Parse {
                what: "page token",
                message: token.clone(),
            })?,
            None => 0,
        };

        let state = self.state.lock();
        if state.failing_page == Some(start / self.page_size) {
            return Err(BackendError::CommandFailed {
                label: "mock list".to_string(),
                stderr: format!("page {} unavailable", start / self.page_size),
            });
        }

        let visible: Vec<&InstanceInfo> = state
            .instances
            .iter()
            .filter(|i| i.state != InstanceState::Terminated)
            .collect();
        let end = (start + self.page_size).min(visible.len());
        let instances = visible
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|i| (*i).clone())
            .collect();

        Ok(InstancePage {
            instances,
            next_page: (end < visible.len()).then(|| end.to_string()),
        })
    }

    async fn get_info(&self, instance_id: &str) -> BackendResult<InstanceInfo> {
        self.record(BackendCall::GetInfo(instance_id.to_string()), "get_info")?;
        self.update(instance_id, |i| i.clone())
    }

    async fn instance_state(&self, instance_id: &str) -> BackendResult<InstanceState> {
        self.record(
            BackendCall::InstanceState(instance_id.to_string()),
            "instance_state",
        )?;

        {
            let mut state = self.state.lock();
            if let Some(remaining) = state.hidden.get_mut(instance_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(instance_not_found(instance_id));
                }
            }
        }

        let stalled = self.state.lock().stalled.contains(instance_id);
        self.update(instance_id, |i| {
            let observed = i.state;
            if !stalled {
                i.state = settled(observed);
            }
            observed
        })
    }

    async fn stop(&self, instance_id: &str) -> BackendResult<()> {
        self.record(BackendCall::Stop(instance_id.to_string()), "stop")?;
        self.update(instance_id, |i| {
            if i.state != InstanceState::Stopped {
                i.state = InstanceState::Stopping;
            }
        })
    }

    async fn deallocate(&self, instance_id: &str) -> BackendResult<()> {
        self.record(BackendCall::Deallocate(instance_id.to_string()), "deallocate")?;
        self.update(instance_id, |i| {
            if i.state != InstanceState::Deallocated {
                i.state = InstanceState::Deallocating;
            }
        })
    }

    async fn create(
        &self,
        image: &str,
        name: &str,
        template: &InstanceInfo,
    ) -> BackendResult<String> {
        self.record(
            BackendCall::Create {
                image: image.to_string(),
                name: name.to_string(),
                template: template.clone(),
            },
            "create",
        )?;

        let mut state = self.state.lock();
        state.next_id += 1;
        let instance_id = format!("i-new{}", state.next_id);
        if self.hide_created_for > 0 {
            state
                .hidden
                .insert(instance_id.clone(), self.hide_created_for);
        }
        state.instances.push(InstanceInfo {
            instance_id: instance_id.clone(),
            name: name.to_string(),
            image: image.to_string(),
            state: InstanceState::Pending,
            provider_spec: None,
            ..template.clone()
        });
        Ok(instance_id)
    }

    async fn delete(&self, instance_id: &str) -> BackendResult<()> {
        self.record(BackendCall::Delete(instance_id.to_string()), "delete")?;
        self.update(instance_id, |i| i.state = InstanceState::Terminated)
    }

    async fn wait_for_status(
        &self,
        instance_id: &str,
        target: InstanceState,
        policy: &WaitPolicy,
    ) -> Result<(), WaitError> {
        self.record(
            BackendCall::WaitForStatus {
                instance_id: instance_id.to_string(),
                target,
            },
            "wait_for_status",
        )?;
        poll_for_status(self, instance_id, target, policy).await
    }

    async fn load_balancer_members(&self, load_balancer: &str) -> BackendResult<Vec<String>> {
        self.record(
            BackendCall::LoadBalancerMembers(load_balancer.to_string()),
            "load_balancer_members",
        )?;
        self.state
            .lock()
            .load_balancers
            .get(load_balancer)
            .cloned()
            .ok_or_else(|| lb_not_found(load_balancer))
    }

    async fn set_load_balancer_members(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> BackendResult<()> {
        self.record(
            BackendCall::SetLoadBalancerMembers {
                load_balancer: load_balancer.to_string(),
                instance_ids: instance_ids.to_vec(),
            },
            "set_load_balancer_members",
        )?;
        let mut state = self.state.lock();
        let members = state
            .load_balancers
            .get_mut(load_balancer)
            .ok_or_else(|| lb_not_found(load_balancer))?;
        *members = instance_ids.to_vec();
        Ok(())
    }
}

/// A running `t2.micro` built from `ami-111` with one 50 GiB root volume.
pub fn sample_instance(instance_id: &str, name: &str) -> InstanceInfo {
    InstanceInfo {
        image: "ami-111".to_string(),
        instance_type: "t2.micro".to_string(),
        block_device_mappings: vec![BlockDeviceMapping::new("/dev/sda1", 50)],
        key_name: Some("ops".to_string()),
        subnet_id: Some("subnet-1".to_string()),
        security_group_ids: vec!["sg-1".to_string()],
        state: InstanceState::Running,
        ..InstanceInfo::new(instance_id, name)
    }
}
