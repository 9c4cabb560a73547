//! Conversions between Azure Resource Manager VM models and [`InstanceInfo`].

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::compute::error::{BackendError, BackendResult};
use crate::compute::model::{BlockDeviceMapping, InstanceInfo, InstanceState, StorageAttributes};

/// Top-level fields the service owns; they must not be sent back on create.
const READ_ONLY_FIELDS: &[&str] = &["id", "resources", "etag"];
const READ_ONLY_PROPERTIES: &[&str] =
    &["vmId", "provisioningState", "instanceView", "timeCreated"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VmListResult {
    #[serde(default)]
    pub value: Vec<Value>,
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Seconds; the v1 endpoint sends this as a string.
    pub expires_in: Value,
}

impl TokenResponse {
    pub fn expires_in_secs(&self) -> u64 {
        match &self.expires_in {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

fn str_at<'a>(vm: &'a Value, pointer: &str) -> Option<&'a str> {
    vm.pointer(pointer).and_then(Value::as_str)
}

fn parse_error(message: impl Into<String>) -> BackendError {
    BackendError::Parse {
        what: "azure virtual machine",
        message: message.into(),
    }
}

/// Builds a snapshot from a VM resource, keeping the full model as `provider_spec`.
pub(crate) fn instance_from_vm(vm: &Value) -> BackendResult<InstanceInfo> {
    let instance_id = str_at(vm, "/id").ok_or_else(|| parse_error("missing id"))?;
    let name = str_at(vm, "/name").ok_or_else(|| parse_error("missing name"))?;

    let image = str_at(vm, "/properties/storageProfile/osDisk/image/uri")
        .or_else(|| str_at(vm, "/properties/storageProfile/imageReference/id"))
        .unwrap_or_default();

    let mut block_device_mappings = Vec::new();
    if let Some(os_disk) = vm.pointer("/properties/storageProfile/osDisk") {
        block_device_mappings.push(disk_mapping(
            str_at(os_disk, "/name").unwrap_or("osDisk").to_string(),
            os_disk,
        ));
    }
    if let Some(data_disks) = vm
        .pointer("/properties/storageProfile/dataDisks")
        .and_then(Value::as_array)
    {
        for disk in data_disks {
            let lun = disk.get("lun").and_then(Value::as_u64).unwrap_or_default();
            block_device_mappings.push(disk_mapping(format!("lun{lun}"), disk));
        }
    }

    let key_name = vm
        .pointer("/properties/osProfile/linuxConfiguration/ssh/publicKeys/0/path")
        .and_then(Value::as_str)
        .map(str::to_string);

    let state = vm
        .pointer("/properties/instanceView")
        .map_or(InstanceState::Unknown, power_state);

    Ok(InstanceInfo {
        instance_id: instance_id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        instance_type: str_at(vm, "/properties/hardwareProfile/vmSize")
            .unwrap_or_default()
            .to_string(),
        block_device_mappings,
        key_name,
        subnet_id: None,
        security_group_ids: Vec::new(),
        state,
        provider_spec: Some(vm.clone()),
    })
}

fn disk_mapping(device_name: String, disk: &Value) -> BlockDeviceMapping {
    BlockDeviceMapping {
        device_name,
        storage: StorageAttributes {
            volume_size_gib: disk.get("diskSizeGB").and_then(Value::as_u64),
            volume_type: str_at(disk, "/managedDisk/storageAccountType").map(str::to_string),
            delete_on_termination: str_at(disk, "/deleteOption").map(|o| o == "Delete"),
        },
    }
}

/// Reads the `PowerState/*` status out of an instance view.
pub(crate) fn power_state(instance_view: &Value) -> InstanceState {
    let codes = instance_view
        .get("statuses")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|s| s.get("code").and_then(Value::as_str));

    let mut creating = false;
    for code in codes {
        if code.starts_with("PowerState/") {
            return InstanceState::from_azure_power_state(code);
        }
        if code == "ProvisioningState/creating" {
            creating = true;
        }
    }

    if creating {
        InstanceState::Pending
    } else {
        InstanceState::Unknown
    }
}

/// Produces the `PUT` body that recreates `template` as `name` from `image`.
///
/// The OS disk gets a name and VHD blob derived from `name`, so the new disk does
/// not collide with the old one.
pub(crate) fn create_body(
    template: &InstanceInfo,
    image: &str,
    name: &str,
) -> BackendResult<Value> {
    let mut vm = template
        .provider_spec
        .clone()
        .ok_or_else(|| parse_error("snapshot carries no Azure VM model"))?;

    let os_disk = vm
        .pointer_mut("/properties/storageProfile/osDisk")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| parse_error("missing storageProfile.osDisk"))?;
    let disk_name = format!("{name}-osdisk");
    os_disk.insert("image".to_string(), json!({ "uri": image }));
    let vhd = os_disk
        .get("vhd")
        .and_then(|v| v.get("uri"))
        .and_then(Value::as_str)
        .map(|uri| rename_blob(uri, &format!("{disk_name}.vhd")));
    if let Some(uri) = vhd {
        os_disk.insert("vhd".to_string(), json!({ "uri": uri }));
    }
    os_disk.insert("name".to_string(), Value::String(disk_name));

    let object = vm
        .as_object_mut()
        .ok_or_else(|| parse_error("model is not an object"))?;
    strip(object, READ_ONLY_FIELDS);
    object.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(properties) = object.get_mut("properties").and_then(Value::as_object_mut) {
        strip(properties, READ_ONLY_PROPERTIES);
    }

    Ok(vm)
}

fn strip(object: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        object.remove(*key);
    }
}

fn rename_blob(uri: &str, file_name: &str) -> String {
    match uri.rsplit_once('/') {
        Some((container, _)) => format!("{container}/{file_name}"),
        None => file_name.to_string(),
    }
}
