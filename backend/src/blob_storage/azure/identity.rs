//! Entra ID access tokens for the storage audience
//!
//! Without a connection string the store authenticates with bearer tokens.
//! Sources are tried in a fixed order: service principal secret, workload
//! identity, managed identity, then the Azure CLI login. The first source that
//! yields a token is used for the rest of the process lifetime.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::blob_storage::{BlobError, BlobResult};

/// Audience for storage access tokens
pub const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Off Azure the metadata endpoint never answers
const IMDS_PROBE_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// One way of obtaining an access token
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Service principal with a client secret
    ClientSecret {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Federated token file projected by Kubernetes workload identity
    WorkloadIdentity {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        token_file: PathBuf,
    },
    /// App Service / Functions identity endpoint
    AppService {
        endpoint: String,
        header: String,
        client_id: Option<String>,
    },
    /// Instance metadata service
    Imds {
        endpoint: String,
        client_id: Option<String>,
    },
    /// `az account get-access-token` for the logged-in developer
    AzureCli,
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TokenSource {
    /// Builds the source chain from environment variables
    ///
    /// `lookup` returns the value of a variable, with blank values treated as
    /// unset.
    pub fn chain_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let authority_host = var("AZURE_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string())
            .trim_end_matches('/')
            .to_string();
        let tenant_id = var("AZURE_TENANT_ID");
        let client_id = var("AZURE_CLIENT_ID");

        let mut sources = Vec::new();

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) =
            (&tenant_id, &client_id, var("AZURE_CLIENT_SECRET"))
        {
            sources.push(Self::ClientSecret {
                authority_host: authority_host.clone(),
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                client_secret,
            });
        }

        if let (Some(tenant_id), Some(client_id), Some(token_file)) =
            (&tenant_id, &client_id, var("AZURE_FEDERATED_TOKEN_FILE"))
        {
            sources.push(Self::WorkloadIdentity {
                authority_host,
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                token_file: PathBuf::from(token_file),
            });
        }

        match (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => sources.push(Self::AppService {
                endpoint,
                header,
                client_id: client_id.clone(),
            }),
            _ => sources.push(Self::Imds {
                endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
                client_id,
            }),
        }

        sources.push(Self::AzureCli);
        sources
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::ClientSecret { .. } => "ClientSecret",
            Self::WorkloadIdentity { .. } => "WorkloadIdentity",
            Self::AppService { .. } => "AppService",
            Self::Imds { .. } => "Imds",
            Self::AzureCli => "AzureCli",
        }
    }

    async fn fetch(&self, client: &reqwest::Client) -> BlobResult<AccessToken> {
        match self {
            Self::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            } => {
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", STORAGE_SCOPE),
                ];
                let request = client
                    .post(format!("{authority_host}/{tenant_id}/oauth2/v2.0/token"))
                    .form(&form);
                token_from(request).await
            }
            Self::WorkloadIdentity {
                authority_host,
                tenant_id,
                client_id,
                token_file,
            } => {
                let assertion = tokio::fs::read_to_string(token_file).await.map_err(|e| {
                    BlobError::StorageUnavailable(format!(
                        "Cannot read federated token file {}: {e}",
                        token_file.display()
                    ))
                })?;
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                    ("client_assertion", assertion.trim()),
                    ("scope", STORAGE_SCOPE),
                ];
                let request = client
                    .post(format!("{authority_host}/{tenant_id}/oauth2/v2.0/token"))
                    .form(&form);
                token_from(request).await
            }
            Self::AppService {
                endpoint,
                header,
                client_id,
            } => {
                let url = identity_url(endpoint, "2019-08-01", client_id.as_deref())?;
                token_from(client.get(url).header("X-IDENTITY-HEADER", header)).await
            }
            Self::Imds {
                endpoint,
                client_id,
            } => {
                let url = identity_url(endpoint, "2018-02-01", client_id.as_deref())?;
                let request = client
                    .get(url)
                    .header("Metadata", "true")
                    .timeout(IMDS_PROBE_TIMEOUT);
                token_from(request).await
            }
            Self::AzureCli => {
                let output = tokio::process::Command::new("az")
                    .args(["account", "get-access-token", "--output", "json"])
                    .args(["--resource", STORAGE_RESOURCE])
                    .output()
                    .await
                    .map_err(|e| {
                        BlobError::StorageUnavailable(format!("Cannot run Azure CLI: {e}"))
                    })?;

                if !output.status.success() {
                    return Err(BlobError::StorageUnavailable(format!(
                        "Azure CLI failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }

                parse_cli_output(&output.stdout)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now()
    }
}

/// Token endpoint response
///
/// Entra ID sends `expires_in`, identity endpoints send `expires_on`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn into_access_token(self) -> BlobResult<AccessToken> {
        let expires_at = match (&self.expires_on, &self.expires_in) {
            (Some(on), _) => epoch_seconds(on).and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            (None, Some(within)) => epoch_seconds(within).map(|secs| Utc::now() + Duration::seconds(secs)),
            (None, None) => None,
        }
        .ok_or_else(|| {
            BlobError::StorageUnavailable("Token response carries no usable expiry".to_string())
        })?;

        Ok(AccessToken {
            token: self.access_token,
            expires_at,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Local time, e.g. `2024-01-01 12:00:00.000000`
    #[serde(default)]
    expires_on: Option<String>,
    /// Epoch seconds, only printed by newer CLI versions
    #[serde(rename = "expires_on", default)]
    expires_on_epoch: Option<i64>,
}

async fn token_from(request: reqwest::RequestBuilder) -> BlobResult<AccessToken> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Token endpoint answered HTTP {status}: {body}");
        return Err(BlobError::StorageUnavailable(format!(
            "Token request failed: HTTP {status}"
        )));
    }

    response.json::<TokenResponse>().await?.into_access_token()
}

fn identity_url(endpoint: &str, api_version: &str, client_id: Option<&str>) -> BlobResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| BlobError::Config(format!("Invalid identity endpoint {endpoint}: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("api-version", api_version)
            .append_pair("resource", STORAGE_RESOURCE);
        if let Some(client_id) = client_id {
            query.append_pair("client_id", client_id);
        }
    }
    Ok(url)
}

fn parse_cli_output(stdout: &[u8]) -> BlobResult<AccessToken> {
    let parsed: CliToken = serde_json::from_slice(stdout).map_err(|e| {
        BlobError::StorageUnavailable(format!("Unexpected Azure CLI output: {e}"))
    })?;

    let expires_at = parsed
        .expires_on_epoch
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| {
            let naive =
                NaiveDateTime::parse_from_str(parsed.expires_on.as_deref()?, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
        })
        .ok_or_else(|| {
            BlobError::StorageUnavailable("Azure CLI token has no usable expiry".to_string())
        })?;

    Ok(AccessToken {
        token: parsed.access_token,
        expires_at,
    })
}

/// Epoch or duration seconds, as a string or a number depending on the endpoint
fn epoch_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(s) => s.parse::<i64>().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

#[derive(Default)]
struct CredentialState {
    /// Index of the source that last produced a token
    active: Option<usize>,
    cached: Option<AccessToken>,
}

/// Fetches and caches bearer tokens from the first working source
pub struct TokenCredential {
    sources: Vec<TokenSource>,
    state: Mutex<CredentialState>,
}

impl fmt::Debug for TokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.sources).finish()
    }
}

impl TokenCredential {
    /// Creates a credential that tries `sources` in order
    #[must_use]
    pub fn new(sources: Vec<TokenSource>) -> Self {
        Self {
            sources,
            state: Mutex::new(CredentialState::default()),
        }
    }

    /// Builds the source chain from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(TokenSource::chain_from(|name| std::env::var(name).ok()))
    }

    /// Returns a valid access token, fetching a new one when the cached token
    /// is about to expire
    ///
    /// # Errors
    ///
    /// Returns `BlobError::StorageUnavailable` if no source yields a token
    pub async fn token(&self, client: &reqwest::Client) -> BlobResult<String> {
        let mut state = self.state.lock().await;

        if let Some(cached) = state.cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.token.clone());
        }

        let (index, fresh) = match state.active {
            Some(index) => (index, self.sources[index].fetch(client).await?),
            None => self.first_working_source(client).await?,
        };

        tracing::debug!(
            "Fetched {:?} token expiring at {}",
            self.sources[index],
            fresh.expires_at
        );

        let token = fresh.token.clone();
        state.active = Some(index);
        state.cached = Some(fresh);
        drop(state);

        Ok(token)
    }

    async fn first_working_source(
        &self,
        client: &reqwest::Client,
    ) -> BlobResult<(usize, AccessToken)> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for (index, source) in self.sources.iter().enumerate() {
            match source.fetch(client).await {
                Ok(token) => {
                    tracing::info!("Authenticating to Azure Storage with {source:?}");
                    return Ok((index, token));
                }
                Err(e) => {
                    tracing::debug!("{source:?} credential unavailable: {e}");
                    failures.push(format!("{source:?}: {e}"));
                }
            }
        }

        Err(BlobError::StorageUnavailable(format!(
            "No Azure credential source succeeded ({})",
            failures.join("; ")
        )))
    }
}
