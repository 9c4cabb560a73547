//! Shapes of the `aws` CLI JSON output we consume.

use std::collections::HashMap;

use serde::Deserialize;

use crate::compute::model::{BlockDeviceMapping, InstanceInfo, InstanceState, StorageAttributes};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeInstancesOutput {
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    pub next_token: Option<String>,
}

impl DescribeInstancesOutput {
    pub fn into_instances(self) -> impl Iterator<Item = Ec2Instance> {
        self.reservations.into_iter().flat_map(|r| r.instances)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Reservation {
    #[serde(default)]
    pub instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Ec2Instance {
    pub instance_id: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub instance_type: String,
    pub key_name: Option<String>,
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<GroupIdentifier>,
    #[serde(default)]
    pub block_device_mappings: Vec<InstanceBlockDevice>,
    pub state: Option<Ec2State>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GroupIdentifier {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InstanceBlockDevice {
    pub device_name: String,
    pub ebs: Option<EbsInstanceBlockDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EbsInstanceBlockDevice {
    pub volume_id: Option<String>,
    pub delete_on_termination: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Ec2State {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeVolumesOutput {
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Volume {
    pub volume_id: String,
    pub size: Option<u64>,
    pub volume_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RunInstancesOutput {
    #[serde(default)]
    pub instances: Vec<LaunchedInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LaunchedInstance {
    pub instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeLoadBalancersOutput {
    #[serde(default)]
    pub load_balancer_descriptions: Vec<LoadBalancerDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoadBalancerDescription {
    #[serde(default)]
    pub instances: Vec<ElbInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ElbInstance {
    pub instance_id: String,
}

impl Ec2Instance {
    /// Value of the `Name` tag, or empty when untagged.
    pub fn name(&self) -> &str {
        self.tags
            .iter()
            .find(|t| t.key == "Name")
            .map(|t| t.value.as_str())
            .unwrap_or("")
    }

    pub fn state(&self) -> InstanceState {
        self.state
            .as_ref()
            .map_or(InstanceState::Unknown, |s| InstanceState::from_aws(&s.name))
    }

    pub fn volume_ids(&self) -> impl Iterator<Item = &str> {
        self.block_device_mappings
            .iter()
            .filter_map(|m| m.ebs.as_ref()?.volume_id.as_deref())
    }

    /// Converts to a snapshot, filling volume attributes from `volumes` (keyed by volume id).
    pub fn into_info(self, volumes: &HashMap<String, Volume>) -> InstanceInfo {
        let name = self.name().to_string();
        let state = self.state();

        let block_device_mappings = self
            .block_device_mappings
            .into_iter()
            .map(|m| {
                let ebs = m.ebs;
                let volume = ebs
                    .as_ref()
                    .and_then(|e| e.volume_id.as_ref())
                    .and_then(|id| volumes.get(id));
                BlockDeviceMapping {
                    device_name: m.device_name,
                    storage: StorageAttributes {
                        volume_size_gib: volume.and_then(|v| v.size),
                        volume_type: volume.and_then(|v| v.volume_type.clone()),
                        delete_on_termination: ebs.and_then(|e| e.delete_on_termination),
                    },
                }
            })
            .collect();

        InstanceInfo {
            instance_id: self.instance_id,
            name,
            image: self.image_id,
            instance_type: self.instance_type,
            block_device_mappings,
            key_name: self.key_name,
            subnet_id: self.subnet_id,
            security_group_ids: self.security_groups.into_iter().map(|g| g.group_id).collect(),
            state,
            provider_spec: None,
        }
    }
}
