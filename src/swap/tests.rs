use std::sync::Arc;

use super::*;
use crate::compute::{BackendCall, MockComputeBackend, sample_instance};

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn backend() -> Arc<MockComputeBackend> {
    Arc::new(
        MockComputeBackend::new()
            .with_instance(sample_instance("i-1", "web-01"))
            .with_instance(sample_instance("i-2", "web-02"))
            .with_instance(sample_instance("i-9", "web-old"))
            .with_load_balancer("lb-1", &["i-9"]),
    )
}

#[tokio::test]
async fn test_swap_replaces_membership() {
    let mock = backend();
    let change = SwapOrchestrator::new(mock.clone())
        .run("lb-1", &ids(&["i-1", "i-2"]))
        .await
        .unwrap();

    assert_eq!(change.members, vec!["i-1", "i-2"]);
    assert_eq!(change.added, vec!["i-1", "i-2"]);
    assert_eq!(change.removed, vec!["i-9"]);
    assert_eq!(mock.load_balancer("lb-1").unwrap(), vec!["i-1", "i-2"]);
}

#[tokio::test]
async fn test_swap_applies_once_with_deduplicated_targets() {
    let mock = backend();
    SwapOrchestrator::new(mock.clone())
        .run("lb-1", &ids(&["i-1", "i-1", "i-9"]))
        .await
        .unwrap();

    assert_eq!(
        mock.mutating_calls(),
        vec![BackendCall::SetLoadBalancerMembers {
            load_balancer: "lb-1".to_string(),
            instance_ids: ids(&["i-1", "i-9"]),
        }]
    );
}

#[tokio::test]
async fn test_unknown_load_balancer() {
    let mock = backend();
    let err = SwapOrchestrator::new(mock.clone())
        .run("lb-missing", &ids(&["i-1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::LoadBalancerNotFound { ref load_balancer } if load_balancer == "lb-missing"));
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_unknown_member_leaves_membership_untouched() {
    let mock = backend();
    let err = SwapOrchestrator::new(mock.clone())
        .run("lb-1", &ids(&["i-1", "i-404"]))
        .await
        .unwrap_err();

    match err {
        ClientError::BackendMembership {
            instance_id,
            reason,
            ..
        } => {
            assert_eq!(instance_id, "i-404");
            assert_eq!(reason, "instance not found");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(mock.load_balancer("lb-1").unwrap(), vec!["i-9"]);
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_terminated_member_is_rejected() {
    let mock = backend();
    mock.delete("i-2").await.unwrap();

    let err = SwapOrchestrator::new(mock.clone())
        .run("lb-1", &ids(&["i-2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::BackendMembership { .. }));
    assert_eq!(mock.load_balancer("lb-1").unwrap(), vec!["i-9"]);
}

#[tokio::test]
async fn test_empty_target_is_rejected() {
    let mock = backend();
    let err = SwapOrchestrator::new(mock.clone())
        .run("lb-1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::EmptyMembership { .. }));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_apply_failure_is_a_mutation_error() {
    let mock = Arc::new(
        MockComputeBackend::new()
            .with_instance(sample_instance("i-1", "web-01"))
            .with_load_balancer("lb-1", &["i-9"])
            .fail_on("set_load_balancer_members"),
    );
    let err = SwapOrchestrator::new(mock)
        .run("lb-1", &ids(&["i-1"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::BackendMutation {
            step: Step::ApplyMembership,
            ..
        }
    ));
}
