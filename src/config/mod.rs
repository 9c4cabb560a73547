//! Environment-backed configuration.
//!
//! The provider is required; polling settings have defaults. Override with
//! `CLIAAS_*` environment variables. Credentials are read from the providers'
//! usual variables (see [`credentials`]).

pub mod credentials;
pub mod error;


pub use credentials::{AwsCredentials, AzureCredentials};
pub use error::{ConfigError, MissingCredentialError};

use std::env;
use std::time::Duration;

use crate::compute::WaitPolicy;
use crate::constants::{
    DEFAULT_DEADLINE_SECS, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS,
};

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    /// Amazon EC2 (driven through the `aws` CLI).
    Aws,
    /// Azure Resource Manager.
    Azure,
}

impl std::str::FromStr for CloudProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aws" | "ec2" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::UnknownProvider {
                value: s.to_string(),
            }),
        }
    }
}

/// Provider selection together with its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Aws(AwsCredentials),
    Azure(AzureCredentials),
}

impl ProviderConfig {
    /// Returns which provider this configures.
    pub fn provider(&self) -> CloudProvider {
        match self {
            Self::Aws(_) => CloudProvider::Aws,
            Self::Azure(_) => CloudProvider::Azure,
        }
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target provider and its credentials.
    pub provider: ProviderConfig,

    /// Image used by `replace-vm` when none is given on the command line.
    pub image: Option<String>,

    /// Delay between instance-state polls. Default: 5s.
    pub poll_interval: Duration,

    /// Polls before a transition is declared stuck. Default: `120`.
    pub max_poll_attempts: u32,

    /// Overall budget for one invocation. Default: 30 minutes.
    pub deadline: Duration,
}

impl Config {
    const ENV_PROVIDER: &'static str = "CLIAAS_PROVIDER";
    const ENV_IMAGE: &'static str = "CLIAAS_IMAGE";
    const ENV_POLL_INTERVAL_SECS: &'static str = "CLIAAS_POLL_INTERVAL_SECS";
    const ENV_MAX_POLL_ATTEMPTS: &'static str = "CLIAAS_MAX_POLL_ATTEMPTS";
    const ENV_DEADLINE_SECS: &'static str = "CLIAAS_DEADLINE_SECS";

    /// Builds a config for `provider` with default polling settings.
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            image: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
        }
    }

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// Credentials are read but not validated here; backends validate them on construction.
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider: CloudProvider = env::var(Self::ENV_PROVIDER)
            .map_err(|_| ConfigError::MissingEnvVar {
                name: Self::ENV_PROVIDER,
            })?
            .parse()?;

        let provider = match provider {
            CloudProvider::Aws => ProviderConfig::Aws(AwsCredentials::from_env()),
            CloudProvider::Azure => ProviderConfig::Azure(AzureCredentials::from_env()),
        };

        let mut config = Self::new(provider);
        config.image = Self::parse_optional_string_from_env(Self::ENV_IMAGE);
        config.poll_interval = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_POLL_INTERVAL_SECS,
            DEFAULT_POLL_INTERVAL_SECS,
        )?);
        config.max_poll_attempts = Self::parse_u64_from_env(
            Self::ENV_MAX_POLL_ATTEMPTS,
            u64::from(DEFAULT_MAX_POLL_ATTEMPTS),
        )?
        .try_into()
        .unwrap_or(u32::MAX);
        config.deadline = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_DEADLINE_SECS,
            DEFAULT_DEADLINE_SECS,
        )?);

        config.validate()?;
        Ok(config)
    }

    /// Rejects polling settings that could never succeed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::ZeroValue {
                name: Self::ENV_MAX_POLL_ATTEMPTS,
            });
        }
        if self.deadline.is_zero() {
            return Err(ConfigError::ZeroValue {
                name: Self::ENV_DEADLINE_SECS,
            });
        }
        Ok(())
    }

    /// Polling policy derived from this config.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.poll_interval, self.max_poll_attempts)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_u64_from_env(var_name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                    source: e,
                }),
            Err(_) => Ok(default),
        }
    }
}
