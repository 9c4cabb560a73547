use std::collections::HashMap;

use super::model::{DescribeInstancesOutput, DescribeLoadBalancersOutput, Volume};
use super::*;
use crate::compute::model::BlockDeviceMapping;

const DESCRIBE_INSTANCES: &str = r#"{
    "Reservations": [
        {
            "Instances": [
                {
                    "InstanceId": "i-abc",
                    "ImageId": "ami-111",
                    "InstanceType": "t2.micro",
                    "KeyName": "ops",
                    "SubnetId": "subnet-1",
                    "State": { "Code": 16, "Name": "running" },
                    "SecurityGroups": [
                        { "GroupId": "sg-1", "GroupName": "web" },
                        { "GroupId": "sg-2", "GroupName": "ssh" }
                    ],
                    "BlockDeviceMappings": [
                        {
                            "DeviceName": "/dev/sda1",
                            "Ebs": { "VolumeId": "vol-1", "DeleteOnTermination": true, "Status": "attached" }
                        }
                    ],
                    "Tags": [
                        { "Key": "env", "Value": "prod" },
                        { "Key": "Name", "Value": "web-01" }
                    ]
                }
            ]
        },
        {
            "Instances": [
                { "InstanceId": "i-untagged", "State": { "Code": 80, "Name": "stopped" } }
            ]
        }
    ],
    "NextToken": "token-2"
}"#;

fn credentials() -> AwsCredentials {
    AwsCredentials {
        access_key_id: "AKIA".to_string(),
        secret_access_key: "secret".to_string(),
        region: "us-east-1".to_string(),
    }
}

fn web_template() -> InstanceInfo {
    InstanceInfo {
        instance_type: "t2.micro".to_string(),
        image: "ami-111".to_string(),
        key_name: Some("ops".to_string()),
        subnet_id: Some("subnet-1".to_string()),
        security_group_ids: vec!["sg-1".to_string(), "sg-2".to_string()],
        block_device_mappings: vec![BlockDeviceMapping::new("/dev/sda1", 50)],
        state: InstanceState::Running,
        ..InstanceInfo::new("i-abc", "web-01")
    }
}

#[test]
fn test_new_rejects_missing_credentials() {
    let err = AwsBackend::new(&AwsCredentials::default()).err().unwrap();
    assert_eq!(err.fields.len(), 3);
}

#[test]
fn test_new_accepts_complete_credentials() {
    let backend = AwsBackend::new(&credentials()).expect("credentials are complete");
    assert_eq!(backend.name(), "aws");
    assert_eq!(
        backend.naming_policy(),
        crate::compute::NamingPolicy::ReuseName
    );
}

#[test]
fn test_parse_describe_instances() {
    let output: DescribeInstancesOutput = serde_json::from_str(DESCRIBE_INSTANCES).unwrap();
    assert_eq!(output.next_token.as_deref(), Some("token-2"));

    let volumes: HashMap<String, Volume> = [(
        "vol-1".to_string(),
        Volume {
            volume_id: "vol-1".to_string(),
            size: Some(50),
            volume_type: Some("gp3".to_string()),
        },
    )]
    .into_iter()
    .collect();

    let infos: Vec<InstanceInfo> = output
        .into_instances()
        .map(|i| i.into_info(&volumes))
        .collect();
    assert_eq!(infos.len(), 2);

    let web = &infos[0];
    assert_eq!(web.instance_id, "i-abc");
    assert_eq!(web.name, "web-01");
    assert_eq!(web.image, "ami-111");
    assert_eq!(web.instance_type, "t2.micro");
    assert_eq!(web.key_name.as_deref(), Some("ops"));
    assert_eq!(web.subnet_id.as_deref(), Some("subnet-1"));
    assert_eq!(web.security_group_ids, vec!["sg-1", "sg-2"]);
    assert_eq!(web.state, InstanceState::Running);
    assert_eq!(web.block_device_mappings.len(), 1);
    let device = &web.block_device_mappings[0];
    assert_eq!(device.device_name, "/dev/sda1");
    assert_eq!(device.storage.volume_size_gib, Some(50));
    assert_eq!(device.storage.volume_type.as_deref(), Some("gp3"));
    assert_eq!(device.storage.delete_on_termination, Some(true));

    let untagged = &infos[1];
    assert_eq!(untagged.name, "");
    assert_eq!(untagged.state, InstanceState::Stopped);
    assert!(untagged.block_device_mappings.is_empty());
}

#[test]
fn test_parse_load_balancer_members() {
    let raw = r#"{
        "LoadBalancerDescriptions": [
            { "LoadBalancerName": "lb-1", "Instances": [ { "InstanceId": "i-9" } ] }
        ]
    }"#;
    let output: DescribeLoadBalancersOutput = serde_json::from_str(raw).unwrap();
    let ids: Vec<String> = output.load_balancer_descriptions[0]
        .instances
        .iter()
        .map(|i| i.instance_id.clone())
        .collect();
    assert_eq!(ids, vec!["i-9"]);
}

#[test]
fn test_describe_instances_args_paging() {
    let first = describe_instances_args(100, None);
    assert!(first.windows(2).any(|w| w[0] == "--max-items" && w[1] == "100"));
    assert!(!first.contains(&"--starting-token".to_string()));

    let next = describe_instances_args(100, Some("token-2"));
    assert!(
        next.windows(2)
            .any(|w| w[0] == "--starting-token" && w[1] == "token-2")
    );
}

#[test]
fn test_run_instances_args_copy_template() {
    let cmd = run_instances_args("ami-999", "web-01", &web_template());

    let pair = |flag: &str| {
        cmd.iter()
            .position(|a| a == flag)
            .map(|i| cmd[i + 1].clone())
    };
    assert_eq!(pair("--image-id").as_deref(), Some("ami-999"));
    assert_eq!(pair("--instance-type").as_deref(), Some("t2.micro"));
    assert_eq!(pair("--key-name").as_deref(), Some("ops"));
    assert_eq!(pair("--subnet-id").as_deref(), Some("subnet-1"));

    let groups_at = cmd.iter().position(|a| a == "--security-group-ids").unwrap();
    assert_eq!(&cmd[groups_at + 1..groups_at + 3], ["sg-1", "sg-2"]);

    let devices: Value = serde_json::from_str(&pair("--block-device-mappings").unwrap()).unwrap();
    assert_eq!(
        devices,
        json!([{ "DeviceName": "/dev/sda1", "Ebs": { "VolumeSize": 50 } }])
    );

    let tags: Value = serde_json::from_str(&pair("--tag-specifications").unwrap()).unwrap();
    assert_eq!(tags[0]["Tags"][0]["Value"], "web-01");
}

#[test]
fn test_run_instances_args_skip_absent_fields() {
    let mut template = InstanceInfo::new("i-abc", "bare");
    template.instance_type = "t3.small".to_string();

    let cmd = run_instances_args("ami-1", "bare", &template);
    assert!(!cmd.contains(&"--key-name".to_string()));
    assert!(!cmd.contains(&"--subnet-id".to_string()));
    assert!(!cmd.contains(&"--security-group-ids".to_string()));
    assert!(!cmd.contains(&"--block-device-mappings".to_string()));
}

#[test]
fn test_membership_delta() {
    let current = vec!["i-9".to_string(), "i-1".to_string()];
    let target = vec!["i-1".to_string(), "i-2".to_string()];

    let (to_add, to_remove) = membership_delta(&current, &target);
    assert_eq!(to_add, vec!["i-2"]);
    assert_eq!(to_remove, vec!["i-9"]);
}

#[test]
fn test_not_found_mapping() {
    let err = BackendError::CommandFailed {
        label: "aws ec2 describe-instances".to_string(),
        stderr: "An error occurred (InvalidInstanceID.NotFound) when calling DescribeInstances"
            .to_string(),
    };
    assert!(matches!(
        instance_not_found(err, "i-gone"),
        BackendError::NotFound { kind: "instance", ref id } if id == "i-gone"
    ));

    let err = BackendError::CommandFailed {
        label: "aws elb describe-load-balancers".to_string(),
        stderr: "AccessDenied".to_string(),
    };
    assert!(matches!(
        lb_not_found(err, "lb-1"),
        BackendError::CommandFailed { .. }
    ));
}

#[cfg(unix)]
mod cli {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    const SECOND_PAGE: &str = r#"{
        "Reservations": [
            {
                "Instances": [
                    {
                        "InstanceId": "i-def",
                        "State": { "Code": 16, "Name": "running" },
                        "Tags": [ { "Key": "Name", "Value": "web-02" } ]
                    }
                ]
            }
        ]
    }"#;

    /// A stand-in `aws` executable that logs its arguments, one call per line.
    struct FakeAws {
        dir: TempDir,
    }

    impl FakeAws {
        fn new(members: &[&str], fail_deregister: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let log = dir.path().join("calls.log");
            let balancers = json!({
                "LoadBalancerDescriptions": [{
                    "LoadBalancerName": "lb-1",
                    "Instances": members
                        .iter()
                        .map(|id| json!({ "InstanceId": id }))
                        .collect::<Vec<_>>(),
                }]
            });
            let volumes = json!({
                "Volumes": [{ "VolumeId": "vol-1", "Size": 50, "VolumeType": "gp3" }]
            });
            let deregister = if fail_deregister {
                "echo 'An error occurred (Throttling) when calling DeregisterInstancesFromLoadBalancer' >&2; exit 255"
            } else {
                "echo '{}'"
            };

            let script = format!(
                r#"#!/bin/sh
printf '%s\n' "$*" >> '{log}'
case "$*" in
  *"--instance-ids i-gone"*)
    echo 'An error occurred (InvalidInstanceID.NotFound) when calling the DescribeInstances operation' >&2
    exit 255 ;;
  "ec2 describe-instances"*"--starting-token"*)
    cat <<'JSON'
{second_page}
JSON
    ;;
  "ec2 describe-instances"*)
    cat <<'JSON'
{first_page}
JSON
    ;;
  "ec2 describe-volumes"*) echo '{volumes}' ;;
  "elb describe-load-balancers"*) echo '{balancers}' ;;
  "elb register-instances-with-load-balancer"*) echo '{{}}' ;;
  "elb deregister-instances-from-load-balancer"*) {deregister} ;;
  *) echo "unexpected call: $*" >&2; exit 2 ;;
esac
"#,
                log = log.display(),
                first_page = DESCRIBE_INSTANCES,
                second_page = SECOND_PAGE,
            );

            let program = dir.path().join("aws");
            std::fs::write(&program, script).unwrap();
            std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
            Self { dir }
        }

        fn backend(&self) -> AwsBackend {
            let runner = CommandRunner::new(self.dir.path().join("aws"))
                .retries(3, Duration::from_millis(1));
            AwsBackend::with_runner(&credentials(), runner).unwrap()
        }

        fn calls(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_list_pages_through_starting_token() {
        let aws = FakeAws::new(&[], false);
        let backend = aws.backend();

        let first = backend.list(None).await.unwrap();
        assert_eq!(first.instances.len(), 2);
        assert_eq!(first.instances[0].name, "web-01");
        assert_eq!(
            first.instances[0].block_device_mappings[0].storage.volume_size_gib,
            Some(50)
        );
        assert_eq!(first.next_page.as_deref(), Some("token-2"));

        let second = backend.list(first.next_page).await.unwrap();
        assert_eq!(second.instances.len(), 1);
        assert_eq!(second.instances[0].name, "web-02");
        assert!(second.next_page.is_none());

        let calls = aws.calls();
        assert_eq!(calls.len(), 3, "calls: {calls:?}");
        assert!(calls[0].starts_with("ec2 describe-instances"));
        assert!(calls[0].contains("--max-items 100"));
        assert!(!calls[0].contains("--starting-token"));
        assert_eq!(calls[1], "ec2 describe-volumes --output json --volume-ids vol-1");
        assert!(calls[2].ends_with("--starting-token token-2"));
        assert!(calls.iter().all(|c| !c.contains("secret")));
    }

    #[tokio::test]
    async fn test_missing_instance_is_not_retried() {
        let aws = FakeAws::new(&[], false);

        let err = aws.backend().instance_state("i-gone").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { kind: "instance", .. }));
        assert_eq!(aws.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_registers_before_deregistering() {
        let aws = FakeAws::new(&["i-old", "i-keep"], false);

        aws.backend()
            .set_load_balancer_members("lb-1", &ids(&["i-keep", "i-new"]))
            .await
            .unwrap();

        let calls = aws.calls();
        assert_eq!(calls.len(), 3, "calls: {calls:?}");
        assert!(calls[0].starts_with("elb describe-load-balancers"));
        assert_eq!(
            calls[1],
            "elb register-instances-with-load-balancer --output json --load-balancer-name lb-1 --instances i-new"
        );
        assert_eq!(
            calls[2],
            "elb deregister-instances-from-load-balancer --output json --load-balancer-name lb-1 --instances i-old"
        );
    }

    #[tokio::test]
    async fn test_empty_deltas_are_skipped() {
        let aws = FakeAws::new(&["i-keep"], false);
        let backend = aws.backend();

        backend
            .set_load_balancer_members("lb-1", &ids(&["i-keep", "i-new"]))
            .await
            .unwrap();
        let calls = aws.calls();
        assert_eq!(calls.len(), 2, "calls: {calls:?}");
        assert!(calls[1].starts_with("elb register-instances-with-load-balancer"));

        backend
            .set_load_balancer_members("lb-1", &ids(&["i-keep"]))
            .await
            .unwrap();
        let calls = aws.calls();
        assert_eq!(calls.len(), 3, "unchanged membership only reads: {calls:?}");
        assert!(calls[2].starts_with("elb describe-load-balancers"));
    }

    #[tokio::test]
    async fn test_failed_deregister_names_registered_instances() {
        let aws = FakeAws::new(&["i-old"], true);

        let err = aws
            .backend()
            .set_load_balancer_members("lb-1", &ids(&["i-new"]))
            .await
            .unwrap_err();

        match &err {
            BackendError::PartialMembership {
                load_balancer,
                registered,
                source,
            } => {
                assert_eq!(load_balancer, "lb-1");
                assert_eq!(registered, &ids(&["i-new"]));
                assert!(matches!(**source, BackendError::CommandFailed { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("registered i-new"));
    }

    #[tokio::test]
    async fn test_failed_deregister_without_registration_is_passed_through() {
        let aws = FakeAws::new(&["i-keep", "i-old"], true);

        let err = aws
            .backend()
            .set_load_balancer_members("lb-1", &ids(&["i-keep"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::CommandFailed { .. }));
    }
}
