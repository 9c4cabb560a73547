//! Replacement and deletion through the public client.

mod common;

use std::sync::Arc;

use cliaas::{
    BackendCall, ClientError, InstanceInfo, InstanceState, MockComputeBackend, NamingPolicy,
    Step, compute::BlockDeviceMapping, sample_instance,
};

use common::fast_client;

fn web_01() -> InstanceInfo {
    InstanceInfo {
        instance_type: "t2.micro".to_string(),
        block_device_mappings: vec![BlockDeviceMapping::new("/dev/sda1", 50)],
        ..sample_instance("i-abc", "web-01")
    }
}

#[tokio::test]
async fn test_replace_single_match_end_to_end() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_page_size(1)
            .with_instance(sample_instance("i-123", "db-01"))
            .with_instance(web_01())
            .with_instance(sample_instance("i-456", "cache-01")),
    );
    let snapshot = web_01();

    let replacement = fast_client(&mock)
        .replace("web-01", "ami-999")
        .await
        .expect("replacement should succeed");

    let new_id = replacement.new_instance_id.clone();
    assert_ne!(new_id, "i-abc");

    let waits: Vec<BackendCall> = mock
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BackendCall::WaitForStatus { .. }))
        .collect();
    assert_eq!(
        waits,
        vec![
            BackendCall::WaitForStatus {
                instance_id: "i-abc".to_string(),
                target: InstanceState::Stopped,
            },
            BackendCall::WaitForStatus {
                instance_id: new_id.clone(),
                target: InstanceState::Running,
            },
        ]
    );

    let created_from = mock.calls().into_iter().find_map(|c| match c {
        BackendCall::Create {
            image, template, ..
        } => Some((image, template)),
        _ => None,
    });
    let (image, template) = created_from.expect("create was called");
    assert_eq!(image, "ami-999");
    assert_eq!(template, snapshot);

    let old = mock.instance("i-abc").unwrap();
    assert_eq!(old.state, InstanceState::Stopped);
    let new = mock.instance(&new_id).unwrap();
    assert_eq!(new.state, InstanceState::Running);
    assert_eq!(new.image, "ami-999");
    assert_eq!(new.instance_type, "t2.micro");
    assert_eq!(new.block_device_mappings, snapshot.block_device_mappings);
}

#[tokio::test]
async fn test_replace_ambiguous_identifier_touches_nothing() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_instance(sample_instance("i-1", "web-01"))
            .with_instance(sample_instance("i-2", "web-02")),
    );

    let err = fast_client(&mock)
        .replace("web", "ami-999")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::AmbiguousMatch { .. }));
    assert!(err.to_string().contains("web-01"));
    assert!(
        !mock
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::Stop(_) | BackendCall::Create { .. }))
    );
}

#[tokio::test]
async fn test_replace_no_match_touches_nothing() {
    let mock = Arc::new(MockComputeBackend::new().with_instance(sample_instance("i-1", "db-01")));

    let err = fast_client(&mock)
        .replace("^web", "ami-999")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoMatch { .. }));
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_failed_listing_page_blocks_replacement() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_page_size(1)
            .with_instance(sample_instance("i-1", "web-01"))
            .with_instance(sample_instance("i-2", "web-02"))
            .fail_page(1),
    );

    let err = fast_client(&mock)
        .replace("web-01", "ami-999")
        .await
        .unwrap_err();
    assert_eq!(err.step(), Some(Step::Resolve));
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_stuck_stop_is_fatal() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_instance(sample_instance("i-abc", "web-01"))
            .stall("i-abc"),
    );

    let err = fast_client(&mock)
        .replace("web-01", "ami-999")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::StateTransitionTimeout {
            step: Step::WaitStopped,
            ..
        }
    ));
    assert!(
        !mock
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::Create { .. }))
    );
}

#[tokio::test]
async fn test_successive_replacements_get_fresh_names() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_naming_policy(NamingPolicy::Timestamped)
            .with_instance(sample_instance("vm-1", "opsman")),
    );

    let replacement = fast_client(&mock)
        .replace("^opsman", "image-2")
        .await
        .unwrap();
    assert!(replacement.new_name.starts_with("opsman_"));
    assert_ne!(replacement.new_name, "opsman");
}

#[tokio::test]
async fn test_delete_resolves_then_deletes() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_instance(sample_instance("i-abc", "web-01"))
            .with_instance(sample_instance("i-123", "db-01")),
    );

    let deleted = fast_client(&mock).delete("db").await.unwrap();
    assert_eq!(deleted, "i-123");
    assert_eq!(
        mock.instance("i-123").unwrap().state,
        InstanceState::Terminated
    );
}
