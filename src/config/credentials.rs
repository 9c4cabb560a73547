//! Provider credentials.
//!
//! Each provider gets an explicit struct so a missing field is reported by name.
//! Loading is lenient (absent variables become empty strings); [`validate`] is
//! where completeness is enforced, and backends call it from their constructors.
//!
//! [`validate`]: AwsCredentials::validate

use std::env;
use std::fmt;

use super::error::MissingCredentialError;
use crate::constants::DEFAULT_RESOURCE_MANAGER_ENDPOINT;

/// Static AWS credentials handed to the `aws` CLI.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl AwsCredentials {
    pub const ENV_ACCESS_KEY_ID: &'static str = "AWS_ACCESS_KEY_ID";
    pub const ENV_SECRET_ACCESS_KEY: &'static str = "AWS_SECRET_ACCESS_KEY";
    pub const ENV_REGION: &'static str = "AWS_REGION";

    /// Reads credentials from the standard `AWS_*` variables.
    pub fn from_env() -> Self {
        Self {
            access_key_id: read_var(Self::ENV_ACCESS_KEY_ID),
            secret_access_key: read_var(Self::ENV_SECRET_ACCESS_KEY),
            region: read_var(Self::ENV_REGION),
        }
    }

    /// Fails with every empty field listed.
    pub fn validate(&self) -> Result<(), MissingCredentialError> {
        collect_missing(
            "aws",
            &[
                (Self::ENV_ACCESS_KEY_ID, &self.access_key_id),
                (Self::ENV_SECRET_ACCESS_KEY, &self.secret_access_key),
                (Self::ENV_REGION, &self.region),
            ],
        )
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("region", &self.region)
            .finish()
    }
}

/// Service-principal credentials for Azure Resource Manager.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub resource_group_name: String,
    /// Optional; falls back to the public cloud endpoint.
    pub resource_manager_endpoint: String,
}

impl Default for AzureCredentials {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: String::new(),
            resource_group_name: String::new(),
            resource_manager_endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
        }
    }
}

impl AzureCredentials {
    pub const ENV_SUBSCRIPTION_ID: &'static str = "AZURE_SUBSCRIPTION_ID";
    pub const ENV_CLIENT_ID: &'static str = "AZURE_CLIENT_ID";
    pub const ENV_CLIENT_SECRET: &'static str = "AZURE_CLIENT_SECRET";
    pub const ENV_TENANT_ID: &'static str = "AZURE_TENANT_ID";
    pub const ENV_RESOURCE_GROUP_NAME: &'static str = "AZURE_RESOURCE_GROUP_NAME";
    pub const ENV_RESOURCE_MANAGER_ENDPOINT: &'static str = "AZURE_RESOURCE_MANAGER_ENDPOINT";

    /// Reads credentials from the `AZURE_*` variables.
    pub fn from_env() -> Self {
        let endpoint = read_var(Self::ENV_RESOURCE_MANAGER_ENDPOINT);
        Self {
            subscription_id: read_var(Self::ENV_SUBSCRIPTION_ID),
            client_id: read_var(Self::ENV_CLIENT_ID),
            client_secret: read_var(Self::ENV_CLIENT_SECRET),
            tenant_id: read_var(Self::ENV_TENANT_ID),
            resource_group_name: read_var(Self::ENV_RESOURCE_GROUP_NAME),
            resource_manager_endpoint: if endpoint.is_empty() {
                DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string()
            } else {
                endpoint
            },
        }
    }

    /// Fails with every empty field listed. The endpoint is not required.
    pub fn validate(&self) -> Result<(), MissingCredentialError> {
        collect_missing(
            "azure",
            &[
                (Self::ENV_SUBSCRIPTION_ID, &self.subscription_id),
                (Self::ENV_CLIENT_ID, &self.client_id),
                (Self::ENV_CLIENT_SECRET, &self.client_secret),
                (Self::ENV_TENANT_ID, &self.tenant_id),
                (Self::ENV_RESOURCE_GROUP_NAME, &self.resource_group_name),
            ],
        )
    }
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("tenant_id", &self.tenant_id)
            .field("resource_group_name", &self.resource_group_name)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .finish()
    }
}

fn collect_missing(
    provider: &'static str,
    fields: &[(&'static str, &String)],
) -> Result<(), MissingCredentialError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingCredentialError {
            provider,
            fields: missing,
        })
    }
}

fn read_var(name: &str) -> String {
    env::var(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}
