//! Provider-neutral compute operations.
//!
//! [`ComputeBackend`] is the seam between the replacement/swap workflows and a
//! cloud. [`AwsBackend`] drives the `aws` CLI, [`AzureBackend`] talks to Azure
//! Resource Manager over HTTPS, and `MockComputeBackend` (feature `mock`) keeps
//! everything in memory for tests.

pub mod aws;
pub mod azure;
pub mod backend;
pub mod command;
pub mod error;
pub mod factory;
pub mod model;
pub mod wait;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use aws::AwsBackend;
pub use azure::AzureBackend;
pub use backend::ComputeBackend;
pub use command::{CommandKind, CommandRunner};
pub use error::{BackendError, BackendResult, WaitError};
pub use factory::build_backend;
pub use model::{
    BlockDeviceMapping, InstanceInfo, InstancePage, InstanceState, NamingPolicy,
    StorageAttributes,
};
pub use wait::{WaitPolicy, poll_for_status};

#[cfg(any(test, feature = "mock"))]
pub use mock::{BackendCall, MockComputeBackend, sample_instance};
