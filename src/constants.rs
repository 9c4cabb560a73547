//! Cross-cutting, shared constants.
//!
//! Polling defaults are expressed in seconds so they line up with the
//! `CLIAAS_*_SECS` environment overrides in [`crate::config`].

/// Seconds between two instance-state polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Polls attempted before a state transition is declared stuck.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Upper bound for a whole invocation, in seconds.
pub const DEFAULT_DEADLINE_SECS: u64 = 30 * 60;

/// Azure Resource Manager endpoint used when none is configured.
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com/";

/// Azure AD authority used for service-principal tokens.
pub const AZURE_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Compute API version used for virtual machine calls.
pub const AZURE_COMPUTE_API_VERSION: &str = "2023-03-01";

/// Page size requested from paginated AWS listings.
pub const AWS_LIST_PAGE_SIZE: u32 = 100;

/// Format of the timestamp segment appended to derived instance names.
pub const REPLACEMENT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
