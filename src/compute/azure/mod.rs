//! Azure Resource Manager backend.
//!
//! Authenticates as a service principal (client-credentials grant) and calls the
//! compute REST API directly. VM names must be unique per creation, so
//! replacements get a timestamped name.

mod model;


use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method};
use serde_json::Value;
use tokio::sync::Mutex;

use self::model::{TokenResponse, VmListResult, create_body, instance_from_vm, power_state};
use super::backend::ComputeBackend;
use super::error::{BackendError, BackendResult};
use super::model::{InstanceInfo, InstancePage, InstanceState, NamingPolicy};
use crate::config::{AzureCredentials, MissingCredentialError};
use crate::constants::{AZURE_COMPUTE_API_VERSION, AZURE_LOGIN_ENDPOINT};

const BACKEND_NAME: &str = "azure";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(120);
const ERROR_BODY_LIMIT: usize = 512;

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Azure implementation of [`ComputeBackend`].
pub struct AzureBackend {
    credentials: AzureCredentials,
    http: HttpClient,
    login_endpoint: String,
    token: Mutex<Option<AccessToken>>,
}

impl AzureBackend {
    /// Creates a backend. Fails if any required credential is empty.
    ///
    /// No request is made here; the first call fetches a token.
    pub fn new(credentials: &AzureCredentials) -> Result<Self, MissingCredentialError> {
        credentials.validate()?;
        Ok(Self {
            credentials: credentials.clone(),
            http: HttpClient::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_else(|_| HttpClient::new()),
            login_endpoint: AZURE_LOGIN_ENDPOINT.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Overrides the Entra ID authority, e.g. for a sovereign cloud.
    pub fn with_login_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.login_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> &str {
        self.credentials.resource_manager_endpoint.trim_end_matches('/')
    }

    fn vms_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines",
            self.endpoint(),
            self.credentials.subscription_id,
            self.credentials.resource_group_name
        )
    }

    /// URL of a resource addressed by its ARM id.
    fn resource_url(&self, resource_id: &str) -> String {
        format!("{}/{}", self.endpoint(), resource_id.trim_start_matches('/'))
    }

    async fn bearer_token(&self) -> BackendResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/token",
            self.login_endpoint, self.credentials.tenant_id
        );
        let resource = format!("{}/", self.endpoint());
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("resource", resource.as_str()),
        ];

        let resp = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| BackendError::Auth(format!("token request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(BackendError::Auth(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Auth(format!("malformed token response: {e}")))?;

        let expires_in = body.expires_in_secs();
        tracing::debug!(expires_in, "acquired service principal token");
        let value = body.access_token.clone();
        *cached = Instant::now()
            .checked_add(Duration::from_secs(expires_in))
            .map(|expires_at| AccessToken {
                value: body.access_token,
                expires_at,
            });
        Ok(value)
    }

    /// Sends an authenticated request. `api_version` is false for `nextLink` URLs,
    /// which already carry it.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        api_version: bool,
    ) -> BackendResult<Value> {
        let token = self.bearer_token().await?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if api_version {
            request = request.query(&[("api-version", AZURE_COMPUTE_API_VERSION)]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, url, "azure request");
        let resp = request.send().await.map_err(|e| BackendError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| BackendError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let mut body = text;
            truncate_on_char_boundary(&mut body, ERROR_BODY_LIMIT);
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| BackendError::Parse {
            what: "azure response",
            message: e.to_string(),
        })
    }
}

/// Cuts `body` to at most `limit` bytes without splitting a character.
fn truncate_on_char_boundary(body: &mut String, limit: usize) {
    if body.len() <= limit {
        return;
    }
    let cut = (0..=limit)
        .rev()
        .find(|&i| body.is_char_boundary(i))
        .unwrap_or(0);
    body.truncate(cut);
}

/// Maps a 404 answer to [`BackendError::NotFound`].
fn not_found_as(err: BackendError, kind: &'static str, id: &str) -> BackendError {
    match err {
        BackendError::Status { status: 404, .. } => BackendError::NotFound {
            kind,
            id: id.to_string(),
        },
        other => other,
    }
}

#[async_trait]
impl ComputeBackend for AzureBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn naming_policy(&self) -> NamingPolicy {
        NamingPolicy::Timestamped
    }

    async fn list(&self, page_token: Option<String>) -> BackendResult<InstancePage> {
        let (url, api_version) = match page_token {
            Some(next_link) => (next_link, false),
            None => (self.vms_url(), true),
        };

        let raw = self.send(Method::GET, &url, None, api_version).await?;
        let page: VmListResult = serde_json::from_value(raw).map_err(|e| BackendError::Parse {
            what: "virtual machine list",
            message: e.to_string(),
        })?;

        Ok(InstancePage {
            instances: page
                .value
                .iter()
                .map(instance_from_vm)
                .collect::<BackendResult<_>>()?,
            next_page: page.next_link.filter(|link| !link.is_empty()),
        })
    }

    async fn get_info(&self, instance_id: &str) -> BackendResult<InstanceInfo> {
        let vm = self
            .send(Method::GET, &self.resource_url(instance_id), None, true)
            .await
            .map_err(|e| not_found_as(e, "instance", instance_id))?;
        instance_from_vm(&vm)
    }

    async fn instance_state(&self, instance_id: &str) -> BackendResult<InstanceState> {
        let url = format!("{}/instanceView", self.resource_url(instance_id));
        let view = self
            .send(Method::GET, &url, None, true)
            .await
            .map_err(|e| not_found_as(e, "instance", instance_id))?;
        Ok(power_state(&view))
    }

    /// Deallocates: Azure keeps billing a merely stopped VM.
    async fn stop(&self, instance_id: &str) -> BackendResult<()> {
        let url = format!("{}/deallocate", self.resource_url(instance_id));
        self.send(Method::POST, &url, None, true)
            .await
            .map_err(|e| not_found_as(e, "instance", instance_id))?;
        Ok(())
    }

    async fn create(
        &self,
        image: &str,
        name: &str,
        template: &InstanceInfo,
    ) -> BackendResult<String> {
        let body = create_body(template, image, name)?;
        let url = format!("{}/{}", self.vms_url(), name);
        let created = self.send(Method::PUT, &url, Some(&body), true).await?;

        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BackendError::Parse {
                what: "create response",
                message: "missing id".to_string(),
            })
    }

    async fn delete(&self, instance_id: &str) -> BackendResult<()> {
        self.send(Method::DELETE, &self.resource_url(instance_id), None, true)
            .await
            .map_err(|e| not_found_as(e, "instance", instance_id))?;
        Ok(())
    }

    async fn load_balancer_members(&self, _load_balancer: &str) -> BackendResult<Vec<String>> {
        Err(BackendError::Unsupported {
            backend: BACKEND_NAME,
            operation: "load balancer membership",
        })
    }

    async fn set_load_balancer_members(
        &self,
        _load_balancer: &str,
        _instance_ids: &[String],
    ) -> BackendResult<()> {
        Err(BackendError::Unsupported {
            backend: BACKEND_NAME,
            operation: "load balancer membership",
        })
    }
}
