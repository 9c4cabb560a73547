use std::sync::Arc;

use super::*;
use crate::compute::{BackendCall, MockComputeBackend, sample_instance};

fn fleet(page_size: usize) -> MockComputeBackend {
    MockComputeBackend::new()
        .with_page_size(page_size)
        .with_instance(sample_instance("i-abc", "web-01"))
        .with_instance(sample_instance("i-def", "web-02"))
        .with_instance(sample_instance("i-123", "db-01"))
}

#[test]
fn test_regex_filter_is_unanchored() {
    let filter = RegexFilter::new("web").unwrap();
    assert!(filter.matches("web-01"));
    assert!(filter.matches("old-web"));
    assert!(!filter.matches("db-01"));

    let anchored = RegexFilter::new("^web-01$").unwrap();
    assert!(anchored.matches("web-01"));
    assert!(!anchored.matches("web-010"));
}

#[test]
fn test_invalid_regex() {
    assert!(RegexFilter::new("web-(").is_err());
}

#[test]
fn test_exact_and_prefix_filters() {
    assert!(ExactFilter("web-01".to_string()).matches("web-01"));
    assert!(!ExactFilter("web".to_string()).matches("web-01"));
    assert!(PrefixFilter("web".to_string()).matches("web-01"));
    assert!(!PrefixFilter("web".to_string()).matches("old-web"));
}

#[tokio::test]
async fn test_resolve_walks_every_page() {
    let mock = Arc::new(fleet(1));
    let resolver = InstanceResolver::new(mock.clone());

    let result = resolver
        .resolve(&RegexFilter::new("web").unwrap())
        .await
        .unwrap();
    assert_eq!(result.names(), vec!["web-01", "web-02"]);

    let lists = mock
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BackendCall::List { .. }))
        .count();
    assert_eq!(lists, 3);
}

#[tokio::test]
async fn test_resolve_fails_on_any_page() {
    let mock = Arc::new(fleet(1).fail_page(2));
    let resolver = InstanceResolver::new(mock);

    let err = resolver
        .resolve(&RegexFilter::new("web").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::BackendQuery {
            step: Step::Resolve,
            ..
        }
    ));
}

#[tokio::test]
async fn test_resolve_swaps_strategy_without_changing_resolver() {
    let resolver = InstanceResolver::new(Arc::new(fleet(2)));

    let exact = resolver
        .resolve(&ExactFilter("web-01".to_string()))
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);

    let prefix = resolver
        .resolve(&PrefixFilter("db".to_string()))
        .await
        .unwrap();
    assert_eq!(prefix.names(), vec!["db-01"]);
}

#[test]
fn test_into_single_enforces_cardinality() {
    let none = MatchResult {
        filter: "x".to_string(),
        instances: Vec::new(),
    };
    assert!(matches!(
        none.into_single(),
        Err(ClientError::NoMatch { .. })
    ));

    let many = MatchResult {
        filter: "web".to_string(),
        instances: vec![
            sample_instance("i-abc", "web-01"),
            sample_instance("i-def", "web-02"),
        ],
    };
    match many.into_single() {
        Err(ClientError::AmbiguousMatch { filter, matches }) => {
            assert_eq!(filter, "web");
            assert_eq!(matches, vec!["web-01", "web-02"]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let one = MatchResult {
        filter: "web-01".to_string(),
        instances: vec![sample_instance("i-abc", "web-01")],
    };
    assert_eq!(one.into_single().unwrap().instance_id, "i-abc");
}
