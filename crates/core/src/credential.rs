//! Bearer tokens for Blob Storage.
//!
//! `DefaultAzureCredential` tries, in order, a service principal from the
//! environment, managed identity, and the Azure CLI login (`az login`). The
//! first source that yields a token wins.

use crate::error::RagError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tokio::process::Command;
use tracing::{debug, info};

pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken, RagError>;
}

/// `https://storage.azure.com/.default` -> `https://storage.azure.com/`
fn scope_to_resource(scope: &str) -> String {
    match scope.strip_suffix(".default") {
        Some(resource) => resource.to_string(),
        None => scope.to_string(),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Built from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`
    /// when all three are set.
    pub fn from_env() -> Option<Self> {
        let tenant_id = non_empty_var("AZURE_TENANT_ID")?;
        let client_id = non_empty_var("AZURE_CLIENT_ID")?;
        let client_secret = non_empty_var("AZURE_CLIENT_SECRET")?;
        let authority_host = non_empty_var("AZURE_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());

        Some(Self::new(authority_host, tenant_id, client_id, client_secret))
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &str {
        "environment client secret"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, RagError> {
        let response = self
            .client
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Auth(format!(
                "token endpoint returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: OAuthTokenResponse = response.json().await?;
        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

enum ManagedIdentitySource {
    Imds {
        endpoint: String,
        client_id: Option<String>,
    },
    AppService {
        endpoint: String,
        header: String,
    },
}

pub struct ManagedIdentityCredential {
    client: Client,
    source: ManagedIdentitySource,
}

impl ManagedIdentityCredential {
    pub fn imds(endpoint: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            source: ManagedIdentitySource::Imds {
                endpoint: endpoint.into(),
                client_id,
            },
        }
    }

    pub fn app_service(endpoint: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            source: ManagedIdentitySource::AppService {
                endpoint: endpoint.into(),
                header: header.into(),
            },
        }
    }

    /// App Service when `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` are present, the
    /// instance metadata service when `AZURE_USE_MANAGED_IDENTITY` is set, and
    /// nothing otherwise.
    pub fn from_env() -> Option<Self> {
        if let (Some(endpoint), Some(header)) = (
            non_empty_var("IDENTITY_ENDPOINT"),
            non_empty_var("IDENTITY_HEADER"),
        ) {
            return Some(Self::app_service(endpoint, header));
        }

        non_empty_var("AZURE_USE_MANAGED_IDENTITY")?;
        Some(Self::imds(IMDS_ENDPOINT, non_empty_var("AZURE_CLIENT_ID")))
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed identity"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, RagError> {
        let resource = scope_to_resource(scope);

        let request = match &self.source {
            ManagedIdentitySource::Imds {
                endpoint,
                client_id,
            } => {
                let mut query = vec![
                    ("api-version", "2018-02-01".to_string()),
                    ("resource", resource),
                ];
                if let Some(client_id) = client_id {
                    query.push(("client_id", client_id.clone()));
                }
                self.client
                    .get(endpoint)
                    .header("Metadata", "true")
                    .query(&query)
            }
            ManagedIdentitySource::AppService { endpoint, header } => self
                .client
                .get(endpoint)
                .header("X-IDENTITY-HEADER", header)
                .query(&[("api-version", "2019-08-01"), ("resource", resource.as_str())]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Auth(format!(
                "managed identity endpoint returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: OAuthTokenResponse = response.json().await?;
        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
}

/// Token from the signed-in Azure CLI.
#[derive(Debug, Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    fn program() -> &'static str {
        if cfg!(windows) {
            "az.cmd"
        } else {
            "az"
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &str {
        "azure cli"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, RagError> {
        let resource = scope_to_resource(scope);
        let output = Command::new(Self::program())
            .args([
                "account",
                "get-access-token",
                "--resource",
                resource.as_str(),
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|error| match error.kind() {
                std::io::ErrorKind::NotFound => {
                    RagError::Auth("azure cli (az) is not installed or not on PATH".to_string())
                }
                _ => RagError::Io(error),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RagError::Auth(format!(
                "az account get-access-token failed: {}",
                stderr.trim()
            )));
        }

        let parsed: CliTokenResponse = serde_json::from_slice(&output.stdout)?;
        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

pub struct DefaultAzureCredential {
    sources: Vec<Box<dyn TokenCredential>>,
}

impl DefaultAzureCredential {
    pub fn from_env() -> Self {
        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();
        if let Some(credential) = ClientSecretCredential::from_env() {
            sources.push(Box::new(credential));
        }
        if let Some(credential) = ManagedIdentityCredential::from_env() {
            sources.push(Box::new(credential));
        }
        sources.push(Box::new(AzureCliCredential));
        Self { sources }
    }

    pub fn with_sources(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    fn name(&self) -> &str {
        "default azure credential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, RagError> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(source = source.name(), "acquired access token");
                    return Ok(token);
                }
                Err(error) => {
                    debug!(source = source.name(), %error, "credential source failed");
                    failures.push(format!("{}: {error}", source.name()));
                }
            }
        }

        if failures.is_empty() {
            return Err(RagError::Auth("no credential sources configured".to_string()));
        }

        Err(RagError::Auth(failures.join("; ")))
    }
}
