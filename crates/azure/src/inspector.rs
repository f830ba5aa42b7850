//! WAF policy inspector over the Azure Resource Manager REST API.
//!
//! Reads live state directly from ARM, independent of terraform state:
//!
//! ```text
//! GET {management}/subscriptions/{sub}/resourceGroups/{rg}/providers/
//!     Microsoft.Network/ApplicationGatewayWebApplicationFirewallPolicies/{name}
//!     ?api-version={api_version}
//! ```
//!
//! | Status    | Result                      |
//! |-----------|-----------------------------|
//! | 200       | decoded [`WafPolicy`]       |
//! | 404       | [`InspectError::NotFound`]  |
//! | 401 / 403 | [`InspectError::Auth`]      |
//! | other     | [`InspectError::Api`]       |

use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use wafprobe_core::config::AzureConfig;
use wafprobe_core::engine::ResourceInspector;
use wafprobe_core::error::InspectError;
use wafprobe_core::metrics as m;
use wafprobe_core::types::{ResourceLocator, WAF_POLICY_NAMESPACE, WAF_POLICY_TYPE, WafPolicy};

use crate::credential::Credential;
use crate::wire::{ArmWafPolicy, parse_arm_error};

/// Resource inspector backed by ARM.
#[derive(Debug)]
pub struct AzureWafInspector {
    client: reqwest::Client,
    credential: Credential,
    management_endpoint: String,
    api_version: String,
}

impl AzureWafInspector {
    /// Builds an inspector using the credential found in the environment.
    pub fn from_config(config: &AzureConfig) -> Result<Self, InspectError> {
        let client = build_client(config)?;
        let credential = Credential::from_env(config, &client);
        debug!(credential = credential.kind(), "azure inspector configured");
        Ok(Self::with_client(client, credential, config))
    }

    /// Builds an inspector with an explicit credential.
    pub fn with_credential(
        config: &AzureConfig,
        credential: Credential,
    ) -> Result<Self, InspectError> {
        Ok(Self::with_client(build_client(config)?, credential, config))
    }

    fn with_client(client: reqwest::Client, credential: Credential, config: &AzureConfig) -> Self {
        Self {
            client,
            credential,
            management_endpoint: config.management_endpoint.clone(),
            api_version: config.api_version.clone(),
        }
    }

    /// Full request URL for a WAF policy.
    pub fn policy_url(&self, locator: &ResourceLocator) -> Result<Url, InspectError> {
        let mut url = Url::parse(&self.management_endpoint).map_err(|e| {
            InspectError::Request(format!(
                "invalid management endpoint '{}': {e}",
                self.management_endpoint
            ))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                InspectError::Request(format!(
                    "management endpoint '{}' cannot be a base url",
                    self.management_endpoint
                ))
            })?
            .pop_if_empty()
            .extend([
                "subscriptions",
                locator.subscription_id.as_str(),
                "resourceGroups",
                locator.resource_group.as_str(),
                "providers",
                WAF_POLICY_NAMESPACE,
                WAF_POLICY_TYPE,
                locator.name.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    async fn fetch(&self, locator: &ResourceLocator) -> Result<WafPolicy, InspectError> {
        let url = self.policy_url(locator)?;
        let token = self.credential.token().await?;

        debug!(resource = %locator, "ARM GET waf policy");
        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| InspectError::Request(e.to_string()))?;

        let status = response.status();
        metrics::counter!(m::INSPECTOR_REQUESTS_TOTAL, m::LABEL_STATUS => status.as_u16().to_string())
            .increment(1);
        let text = response
            .text()
            .await
            .map_err(|e| InspectError::Request(format!("failed to read response body: {e}")))?;

        match status {
            StatusCode::OK => {
                let arm: ArmWafPolicy =
                    serde_json::from_str(&text).map_err(|e| InspectError::Decode(e.to_string()))?;
                Ok(arm.into())
            }
            StatusCode::NOT_FOUND => Err(InspectError::NotFound {
                resource: locator.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(InspectError::Auth(parse_arm_error(&error_body(text))))
            }
            other => {
                let message = parse_arm_error(&error_body(text));
                warn!(resource = %locator, status = other.as_u16(), error = %message, "ARM request failed");
                Err(InspectError::Api {
                    status: other.as_u16(),
                    message,
                })
            }
        }
    }
}

impl ResourceInspector for AzureWafInspector {
    async fn exists(&self, locator: &ResourceLocator) -> Result<bool, InspectError> {
        match self.fetch(locator).await {
            Ok(_) => Ok(true),
            Err(InspectError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, locator: &ResourceLocator) -> Result<WafPolicy, InspectError> {
        self.fetch(locator).await
    }
}

fn build_client(config: &AzureConfig) -> Result<reqwest::Client, InspectError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| InspectError::Request(format!("failed to build http client: {e}")))
}

fn error_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
