//! EC2 backend driven through the `aws` CLI.
//!
//! Credentials are passed to the child process environment, never on the command
//! line. Replacements reuse the current instance name.

mod model;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use self::model::{
    DescribeInstancesOutput, DescribeLoadBalancersOutput, DescribeVolumesOutput, Ec2Instance,
    RunInstancesOutput, Volume,
};
use super::backend::ComputeBackend;
use super::command::{CommandKind, CommandRunner};
use super::error::{BackendError, BackendResult};
use super::model::{InstanceInfo, InstancePage, InstanceState};
use crate::config::{AwsCredentials, MissingCredentialError};
use crate::constants::AWS_LIST_PAGE_SIZE;

const BACKEND_NAME: &str = "aws";

/// States worth resolving against; terminated instances linger in listings for a while.
const LISTED_STATES: &str = "Name=instance-state-name,Values=pending,running,stopping,stopped";

/// EC2 implementation of [`ComputeBackend`].
pub struct AwsBackend {
    runner: CommandRunner,
    page_size: u32,
}

impl AwsBackend {
    /// Creates a backend using `aws` from `PATH`. Fails if any credential is empty.
    pub fn new(credentials: &AwsCredentials) -> Result<Self, MissingCredentialError> {
        Self::with_runner(credentials, CommandRunner::new("aws"))
    }

    /// Creates a backend around an explicit runner (e.g. a non-default CLI path).
    pub fn with_runner(
        credentials: &AwsCredentials,
        runner: CommandRunner,
    ) -> Result<Self, MissingCredentialError> {
        credentials.validate()?;
        let runner = runner
            .env(AwsCredentials::ENV_ACCESS_KEY_ID, &credentials.access_key_id)
            .env(AwsCredentials::ENV_SECRET_ACCESS_KEY, &credentials.secret_access_key)
            .env(AwsCredentials::ENV_REGION, &credentials.region)
            .env("AWS_DEFAULT_REGION", &credentials.region)
            .env("AWS_PAGER", "");
        Ok(Self {
            runner,
            page_size: AWS_LIST_PAGE_SIZE,
        })
    }

    async fn describe_instances(
        &self,
        args: Vec<String>,
    ) -> BackendResult<DescribeInstancesOutput> {
        self.runner
            .run_json(&args, "aws ec2 describe-instances", CommandKind::Query)
            .await
    }

    async fn describe_one(&self, instance_id: &str) -> BackendResult<Ec2Instance> {
        let output = self
            .describe_instances(args(&[
                "ec2",
                "describe-instances",
                "--output",
                "json",
                "--instance-ids",
                instance_id,
            ]))
            .await
            .map_err(|e| instance_not_found(e, instance_id))?;

        output
            .into_instances()
            .next()
            .ok_or_else(|| BackendError::NotFound {
                kind: "instance",
                id: instance_id.to_string(),
            })
    }

    /// Looks up volume sizes for every EBS volume attached to `instances`.
    async fn volumes_for(
        &self,
        instances: &[Ec2Instance],
    ) -> BackendResult<HashMap<String, Volume>> {
        let ids: Vec<String> = instances
            .iter()
            .flat_map(|i| i.volume_ids())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut cmd = args(&["ec2", "describe-volumes", "--output", "json", "--volume-ids"]);
        cmd.extend(ids);
        let output: DescribeVolumesOutput = self
            .runner
            .run_json(&cmd, "aws ec2 describe-volumes", CommandKind::Query)
            .await?;

        Ok(output
            .volumes
            .into_iter()
            .map(|v| (v.volume_id.clone(), v))
            .collect())
    }

    async fn change_membership(
        &self,
        subcommand: &str,
        load_balancer: &str,
        ids: &[String],
    ) -> BackendResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let label = format!("aws elb {subcommand}");
        let mut cmd = args(&[
            "elb",
            subcommand,
            "--output",
            "json",
            "--load-balancer-name",
            load_balancer,
            "--instances",
        ]);
        cmd.extend(ids.iter().cloned());
        self.runner
            .run(&cmd, &label, CommandKind::Mutation)
            .await
            .map_err(|e| lb_not_found(e, load_balancer))?;
        Ok(())
    }
}

#[async_trait]
impl ComputeBackend for AwsBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn list(&self, page_token: Option<String>) -> BackendResult<InstancePage> {
        let output = self
            .describe_instances(describe_instances_args(self.page_size, page_token.as_deref()))
            .await?;
        let next_page = output.next_token.clone();
        let instances: Vec<Ec2Instance> = output.into_instances().collect();
        let volumes = self.volumes_for(&instances).await?;

        Ok(InstancePage {
            instances: instances
                .into_iter()
                .map(|i| i.into_info(&volumes))
                .collect(),
            next_page,
        })
    }

    async fn get_info(&self, instance_id: &str) -> BackendResult<InstanceInfo> {
        let instance = self.describe_one(instance_id).await?;
        let volumes = self.volumes_for(std::slice::from_ref(&instance)).await?;
        Ok(instance.into_info(&volumes))
    }

    async fn instance_state(&self, instance_id: &str) -> BackendResult<InstanceState> {
        Ok(self.describe_one(instance_id).await?.state())
    }

    async fn stop(&self, instance_id: &str) -> BackendResult<()> {
        self.runner
            .run(
                &args(&[
                    "ec2",
                    "stop-instances",
                    "--output",
                    "json",
                    "--instance-ids",
                    instance_id,
                ]),
                "aws ec2 stop-instances",
                CommandKind::Mutation,
            )
            .await
            .map_err(|e| instance_not_found(e, instance_id))?;
        Ok(())
    }

    async fn create(
        &self,
        image: &str,
        name: &str,
        template: &InstanceInfo,
    ) -> BackendResult<String> {
        let output: RunInstancesOutput = self
            .runner
            .run_json(
                &run_instances_args(image, name, template),
                "aws ec2 run-instances",
                CommandKind::Mutation,
            )
            .await?;

        output
            .instances
            .into_iter()
            .next()
            .map(|i| i.instance_id)
            .ok_or_else(|| BackendError::Parse {
                what: "run-instances output",
                message: "no instance returned".to_string(),
            })
    }

    async fn delete(&self, instance_id: &str) -> BackendResult<()> {
        self.runner
            .run(
                &args(&[
                    "ec2",
                    "terminate-instances",
                    "--output",
                    "json",
                    "--instance-ids",
                    instance_id,
                ]),
                "aws ec2 terminate-instances",
                CommandKind::Mutation,
            )
            .await
            .map_err(|e| instance_not_found(e, instance_id))?;
        Ok(())
    }

    async fn load_balancer_members(&self, load_balancer: &str) -> BackendResult<Vec<String>> {
        let output: DescribeLoadBalancersOutput = self
            .runner
            .run_json(
                &args(&[
                    "elb",
                    "describe-load-balancers",
                    "--output",
                    "json",
                    "--load-balancer-names",
                    load_balancer,
                ]),
                "aws elb describe-load-balancers",
                CommandKind::Query,
            )
            .await
            .map_err(|e| lb_not_found(e, load_balancer))?;

        let description = output
            .load_balancer_descriptions
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound {
                kind: "load balancer",
                id: load_balancer.to_string(),
            })?;

        Ok(description
            .instances
            .into_iter()
            .map(|i| i.instance_id)
            .collect())
    }

    /// Classic ELB has no set-membership call: new members are registered before
    /// stale ones are deregistered, so the balancer never has zero targets.
    ///
    /// If deregistration fails after a registration went through, the balancer
    /// serves the union of both sets and [`BackendError::PartialMembership`]
    /// names what was added.
    async fn set_load_balancer_members(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> BackendResult<()> {
        let current = self.load_balancer_members(load_balancer).await?;
        let (to_add, to_remove) = membership_delta(&current, instance_ids);

        self.change_membership("register-instances-with-load-balancer", load_balancer, &to_add)
            .await?;
        let result = self
            .change_membership(
                "deregister-instances-from-load-balancer",
                load_balancer,
                &to_remove,
            )
            .await;

        match result {
            Err(e) if !to_add.is_empty() => {
                tracing::warn!(
                    load_balancer,
                    registered = ?to_add,
                    stale = ?to_remove,
                    error = %e,
                    "load balancer membership partially applied"
                );
                Err(BackendError::PartialMembership {
                    load_balancer: load_balancer.to_string(),
                    registered: to_add,
                    source: Box::new(e),
                })
            }
            other => other,
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn instance_not_found(err: BackendError, instance_id: &str) -> BackendError {
    not_found_as(err, "InvalidInstanceID", "instance", instance_id)
}

fn lb_not_found(err: BackendError, load_balancer: &str) -> BackendError {
    not_found_as(err, "LoadBalancerNotFound", "load balancer", load_balancer)
}

/// Maps a CLI failure whose stderr names `code` to [`BackendError::NotFound`].
fn not_found_as(err: BackendError, code: &str, kind: &'static str, id: &str) -> BackendError {
    match err {
        BackendError::CommandFailed { ref stderr, .. } if stderr.contains(code) => {
            BackendError::NotFound {
                kind,
                id: id.to_string(),
            }
        }
        other => other,
    }
}

pub(crate) fn describe_instances_args(page_size: u32, page_token: Option<&str>) -> Vec<String> {
    let mut cmd = args(&[
        "ec2",
        "describe-instances",
        "--output",
        "json",
        "--filters",
        LISTED_STATES,
        "--max-items",
    ]);
    cmd.push(page_size.to_string());
    if let Some(token) = page_token {
        cmd.push("--starting-token".to_string());
        cmd.push(token.to_string());
    }
    cmd
}

pub(crate) fn run_instances_args(
    image: &str,
    name: &str,
    template: &InstanceInfo,
) -> Vec<String> {
    let mut cmd = args(&[
        "ec2",
        "run-instances",
        "--output",
        "json",
        "--count",
        "1",
        "--image-id",
        image,
        "--instance-type",
        template.instance_type.as_str(),
    ]);

    if let Some(key) = &template.key_name {
        cmd.push("--key-name".to_string());
        cmd.push(key.clone());
    }
    if let Some(subnet) = &template.subnet_id {
        cmd.push("--subnet-id".to_string());
        cmd.push(subnet.clone());
    }
    if !template.security_group_ids.is_empty() {
        cmd.push("--security-group-ids".to_string());
        cmd.extend(template.security_group_ids.iter().cloned());
    }
    if !template.block_device_mappings.is_empty() {
        cmd.push("--block-device-mappings".to_string());
        cmd.push(block_device_mappings_json(template).to_string());
    }

    let tags = json!([{
        "ResourceType": "instance",
        "Tags": [{ "Key": "Name", "Value": name }],
    }]);
    cmd.push("--tag-specifications".to_string());
    cmd.push(tags.to_string());
    cmd
}

fn block_device_mappings_json(template: &InstanceInfo) -> Value {
    let mappings = template
        .block_device_mappings
        .iter()
        .map(|m| {
            let mut ebs = Map::new();
            if let Some(size) = m.storage.volume_size_gib {
                ebs.insert("VolumeSize".to_string(), json!(size));
            }
            if let Some(kind) = &m.storage.volume_type {
                ebs.insert("VolumeType".to_string(), json!(kind));
            }
            if let Some(delete) = m.storage.delete_on_termination {
                ebs.insert("DeleteOnTermination".to_string(), json!(delete));
            }
            json!({ "DeviceName": m.device_name, "Ebs": ebs })
        })
        .collect();
    Value::Array(mappings)
}

/// Returns `(to_add, to_remove)` to turn `current` into `target`.
pub(crate) fn membership_delta(
    current: &[String],
    target: &[String],
) -> (Vec<String>, Vec<String>) {
    let to_add = target
        .iter()
        .filter(|id| !current.contains(id))
        .cloned()
        .collect();
    let to_remove = current
        .iter()
        .filter(|id| !target.contains(id))
        .cloned()
        .collect();
    (to_add, to_remove)
}
