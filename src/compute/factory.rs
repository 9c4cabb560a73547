use std::sync::Arc;

use super::aws::AwsBackend;
use super::azure::AzureBackend;
use super::backend::ComputeBackend;
use crate::config::{MissingCredentialError, ProviderConfig};

/// Builds the backend for the configured provider.
///
/// Fails before any cloud call if a required credential is missing.
pub fn build_backend(
    provider: &ProviderConfig,
) -> Result<Arc<dyn ComputeBackend>, MissingCredentialError> {
    let backend: Arc<dyn ComputeBackend> = match provider {
        ProviderConfig::Aws(credentials) => Arc::new(AwsBackend::new(credentials)?),
        ProviderConfig::Azure(credentials) => Arc::new(AzureBackend::new(credentials)?),
    };
    tracing::debug!(backend = backend.name(), "compute backend ready");
    Ok(backend)
}
