//! Bearer token acquisition for the management API.
//!
//! [`Credential::from_env`] picks a source in this order:
//! 1. Service principal from `ARM_CLIENT_ID` / `ARM_CLIENT_SECRET` / `ARM_TENANT_ID`
//!    (the variables the terraform azurerm provider reads), then the same
//!    triple with the `AZURE_` prefix
//! 2. Azure CLI (`az account get-access-token`)
//!
//! Service principal tokens are cached until 60 seconds before expiry.

use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use wafprobe_core::config::AzureConfig;
use wafprobe_core::error::InspectError;

/// Token source for management API requests.
pub enum Credential {
    /// OAuth2 client-credentials flow
    ServicePrincipal(ServicePrincipal),
    /// Token from a logged-in Azure CLI, issued for `resource`
    AzureCli {
        tenant_id: Option<String>,
        resource: String,
    },
    /// Fixed token (tests, pre-acquired tokens)
    Static(String),
}

impl Credential {
    /// Selects a credential from the process environment.
    pub fn from_env(config: &AzureConfig, client: &reqwest::Client) -> Self {
        let tenant_id = non_empty(config.tenant_id.clone())
            .or_else(|| env_var("ARM_TENANT_ID"))
            .or_else(|| env_var("AZURE_TENANT_ID"));

        for prefix in ["ARM", "AZURE"] {
            let client_id = env_var(&format!("{prefix}_CLIENT_ID"));
            let client_secret = env_var(&format!("{prefix}_CLIENT_SECRET"));
            if let (Some(client_id), Some(client_secret), Some(tenant_id)) =
                (client_id, client_secret, tenant_id.clone())
            {
                debug!(source = prefix, "using service principal credential");
                return Self::ServicePrincipal(ServicePrincipal::new(
                    client.clone(),
                    &config.login_endpoint,
                    &config.management_endpoint,
                    tenant_id,
                    client_id,
                    client_secret,
                ));
            }
        }

        debug!("using azure cli credential");
        Self::AzureCli {
            tenant_id,
            resource: config.management_endpoint.trim_end_matches('/').to_owned(),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServicePrincipal(_) => "service_principal",
            Self::AzureCli { .. } => "azure_cli",
            Self::Static(_) => "static",
        }
    }

    /// Returns a bearer token.
    pub async fn token(&self) -> Result<String, InspectError> {
        match self {
            Self::ServicePrincipal(sp) => sp.token().await,
            Self::AzureCli {
                tenant_id,
                resource,
            } => azure_cli_token(resource, tenant_id.as_deref()).await,
            Self::Static(token) => Ok(token.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServicePrincipal(sp) => f.debug_tuple("ServicePrincipal").field(sp).finish(),
            Self::AzureCli {
                tenant_id,
                resource,
            } => f
                .debug_struct("AzureCli")
                .field("tenant_id", tenant_id)
                .field("resource", resource)
                .finish(),
            Self::Static(_) => f.write_str("Static(<redacted>)"),
        }
    }
}

/// Service principal (client credentials) token source.
pub struct ServicePrincipal {
    client: reqwest::Client,
    token_url: String,
    scope: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<(String, Instant)>>,
}

impl ServicePrincipal {
    pub fn new(
        client: reqwest::Client,
        login_endpoint: &str,
        management_endpoint: &str,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_endpoint.trim_end_matches('/'),
                tenant_id
            ),
            scope: format!("{}/.default", management_endpoint.trim_end_matches('/')),
            client_id,
            client_secret,
            cache: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String, InspectError> {
        {
            let guard = self.cache.lock().await;
            if let Some((token, expiry)) = guard.as_ref() {
                if Instant::now() < *expiry {
                    return Ok(token.clone());
                }
            }
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| InspectError::Auth(format!("token request: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| InspectError::Auth(format!("token decode: {e}")))?;
        if !status.is_success() {
            return Err(InspectError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body["error_description"]
                    .as_str()
                    .or_else(|| body["error"].as_str())
                    .unwrap_or("unknown error")
            )));
        }

        let token = body["access_token"]
            .as_str()
            .ok_or_else(|| InspectError::Auth("no access_token in token response".to_owned()))?
            .to_owned();
        let expires_in = body["expires_in"].as_u64().unwrap_or(3600);
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));

        *self.cache.lock().await = Some((token.clone(), expiry));
        Ok(token)
    }
}

impl fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

fn azure_cli_args(resource: &str, tenant_id: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = ["account", "get-access-token", "--resource", resource]
        .into_iter()
        .map(str::to_owned)
        .collect();
    args.extend(["--output".to_owned(), "json".to_owned()]);
    if let Some(tenant) = tenant_id {
        args.extend(["--tenant".to_owned(), tenant.to_owned()]);
    }
    args
}

async fn azure_cli_token(resource: &str, tenant_id: Option<&str>) -> Result<String, InspectError> {
    let mut command = tokio::process::Command::new("az");
    command.args(azure_cli_args(resource, tenant_id));

    let output = command.output().await.map_err(|e| {
        InspectError::Auth(format!(
            "az CLI not available: {e}. Install Azure CLI or set ARM_CLIENT_ID/ARM_CLIENT_SECRET/ARM_TENANT_ID"
        ))
    })?;
    if !output.status.success() {
        return Err(InspectError::Auth(format!(
            "az account get-access-token failed: {}. Run 'az login' first.",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let body: Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| InspectError::Auth(format!("az CLI output parse: {e}")))?;
    body["accessToken"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| InspectError::Auth("az CLI: no accessToken in output".to_owned()))
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
