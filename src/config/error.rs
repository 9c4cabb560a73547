//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `CLIAAS_PROVIDER` was not set.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar { name: &'static str },

    /// `CLIAAS_PROVIDER` named a provider we do not support.
    #[error("unknown cloud provider '{value}': expected 'aws' or 'azure'")]
    UnknownProvider { value: String },

    /// A numeric override could not be parsed.
    #[error("failed to parse {name}='{value}': {source}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A numeric override parsed but is not usable (e.g. zero attempts).
    #[error("{name} must be greater than zero")]
    ZeroValue { name: &'static str },
}

/// Credential fields that were empty when a backend was constructed.
///
/// Every absent field is listed, not just the first one found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing {provider} credentials: {}", fields.join(", "))]
pub struct MissingCredentialError {
    /// Provider the credentials belong to.
    pub provider: &'static str,
    /// Environment-variable names of the empty fields, in declaration order.
    pub fields: Vec<&'static str>,
}
