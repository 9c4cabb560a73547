//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cliaas::{Client, MockComputeBackend, WaitPolicy};

/// Client over `mock` that polls every millisecond, at most 10 times.
pub fn fast_client(mock: &Arc<MockComputeBackend>) -> Client {
    Client::new(mock.clone()).with_wait_policy(WaitPolicy::new(Duration::from_millis(1), 10))
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
