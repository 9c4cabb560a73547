use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a cloud instance, normalised across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    /// Stop that also released the compute reservation (Azure).
    Deallocating,
    Deallocated,
    ShuttingDown,
    Terminated,
    /// Provider reported a state we do not model.
    Unknown,
}

impl InstanceState {
    /// Maps an EC2 `State.Name`.
    pub fn from_aws(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            _ => Self::Unknown,
        }
    }

    /// Maps an Azure instance-view status code such as `PowerState/running`.
    pub fn from_azure_power_state(code: &str) -> Self {
        match code.strip_prefix("PowerState/").unwrap_or(code) {
            "starting" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "deallocating" => Self::Deallocating,
            "deallocated" => Self::Deallocated,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if observing `self` completes a wait for `target`.
    ///
    /// A deallocated instance counts as stopped.
    pub fn satisfies(self, target: InstanceState) -> bool {
        self == target || (target == Self::Stopped && self == Self::Deallocated)
    }

    /// Returns `true` unless the instance is gone or going away.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Deallocating => "deallocating",
            Self::Deallocated => "deallocated",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Storage attributes of one attached device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAttributes {
    pub volume_size_gib: Option<u64>,
    pub volume_type: Option<String>,
    pub delete_on_termination: Option<bool>,
}

/// Device name to storage mapping, e.g. `/dev/sda1` with a 50 GiB volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub storage: StorageAttributes,
}

impl BlockDeviceMapping {
    pub fn new(device_name: impl Into<String>, volume_size_gib: u64) -> Self {
        Self {
            device_name: device_name.into(),
            storage: StorageAttributes {
                volume_size_gib: Some(volume_size_gib),
                ..Default::default()
            },
        }
    }
}

/// Point-in-time snapshot of an instance, used as the template for its replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub name: String,
    /// Image (AMI id, VHD URI, ...) the instance was built from.
    pub image: String,
    pub instance_type: String,
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    pub key_name: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group_ids: Vec<String>,
    pub state: InstanceState,
    /// Raw provider model for fields the semantic snapshot does not cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_spec: Option<serde_json::Value>,
}

impl InstanceInfo {
    /// Minimal snapshot with only identity fields set.
    pub fn new(instance_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            image: String::new(),
            instance_type: String::new(),
            block_device_mappings: Vec::new(),
            key_name: None,
            subnet_id: None,
            security_group_ids: Vec::new(),
            state: InstanceState::Unknown,
            provider_spec: None,
        }
    }
}

/// One page of an instance listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstancePage {
    pub instances: Vec<InstanceInfo>,
    /// Continuation token; `None` when this was the last page.
    pub next_page: Option<String>,
}

/// How a backend names the instance it creates as a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingPolicy {
    /// Reuse the current name in place.
    #[default]
    ReuseName,
    /// Names must be unique per creation; derive one with a timestamp suffix.
    Timestamped,
}
