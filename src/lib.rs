//! Cloud VM replacement and load balancer membership swaps.
//!
//! # Public API Surface
//!
//! ## Facade
//! - [`Client`] - replace, delete, and swap operations
//! - [`ClientError`], [`Step`] - failures with the step and identifier they apply to
//!
//! ## Workflows
//! - [`ReplacementOrchestrator`], [`Replacement`] - stop, recreate from a new image
//! - [`SwapOrchestrator`], [`MembershipChange`] - whole-set membership replacement
//! - [`InstanceResolver`], [`NameFilter`] - identifier resolution
//!
//! ## Backends
//! - [`ComputeBackend`] - capability trait, implemented by [`AwsBackend`] and [`AzureBackend`]
//! - [`build_backend`] - picks the implementation from [`Config`]
//!
//! ## Test/Mock Support
//! `MockComputeBackend` is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod client;
pub mod compute;
pub mod config;
pub mod constants;
pub mod error;
pub mod replace;
pub mod resolver;
pub mod swap;

pub use client::Client;
pub use compute::{
    AwsBackend, AzureBackend, BackendError, BackendResult, ComputeBackend, InstanceInfo,
    InstanceState, NamingPolicy, WaitError, WaitPolicy, build_backend,
};
#[cfg(any(test, feature = "mock"))]
pub use compute::{BackendCall, MockComputeBackend, sample_instance};
pub use config::{
    AwsCredentials, AzureCredentials, CloudProvider, Config, ConfigError, MissingCredentialError,
    ProviderConfig,
};
pub use error::{ClientError, ClientResult, Step};
pub use replace::{Replacement, ReplacementOrchestrator, ReplacementState, derive_replacement_name};
pub use resolver::{
    ExactFilter, InstanceResolver, MatchResult, NameFilter, PrefixFilter, RegexFilter,
};
pub use swap::{MembershipChange, SwapOrchestrator};
