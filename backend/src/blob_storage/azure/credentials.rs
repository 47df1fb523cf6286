//! Credential resolution for Azure Blob Storage

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::identity::TokenCredential;
use crate::blob_storage::{BlobError, BlobResult};

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Parsed storage account connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Storage account name
    pub account_name: Option<String>,
    /// Base64 account key
    pub account_key: Option<String>,
    /// Blob service endpoint, without a trailing slash
    pub blob_endpoint: String,
    /// SAS token without the leading `?`
    pub sas_token: Option<String>,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConnectionString {
    /// Parses a `Key=Value;Key=Value` connection string
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Config` if no blob endpoint can be derived
    pub fn parse(raw: &str) -> BlobResult<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut blob_endpoint = None;
        let mut sas_token = None;
        let mut development = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(BlobError::Config(format!(
                    "Malformed connection string segment without '=': {}",
                    part.chars().take(24).collect::<String>()
                )));
            };

            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => account_name = Some(value.to_string()),
                "accountkey" => account_key = Some(value.to_string()),
                "defaultendpointsprotocol" => protocol = value.to_string(),
                "endpointsuffix" => suffix = value.to_string(),
                "blobendpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "sharedaccesssignature" => {
                    sas_token = Some(value.trim_start_matches('?').to_string());
                }
                "usedevelopmentstorage" => development = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Ok(Self {
                account_name: Some(DEV_ACCOUNT_NAME.to_string()),
                account_key: Some(DEV_ACCOUNT_KEY.to_string()),
                blob_endpoint: DEV_BLOB_ENDPOINT.to_string(),
                sas_token: None,
            });
        }

        let blob_endpoint = match (blob_endpoint, &account_name) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("{protocol}://{account}.blob.{suffix}"),
            (None, None) => {
                return Err(BlobError::Config(
                    "Connection string needs AccountName or BlobEndpoint".to_string(),
                ))
            }
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
            sas_token,
        })
    }

    /// Picks the authentication scheme the connection string carries
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Config` if neither an account key nor a SAS token
    /// is present, or the account key is not valid base64
    pub fn auth(&self) -> BlobResult<AzureAuth> {
        match (&self.account_name, &self.account_key, &self.sas_token) {
            (Some(account), Some(key), _) => {
                let key = STANDARD
                    .decode(key)
                    .map_err(|e| BlobError::Config(format!("Invalid AccountKey: {e}")))?;
                Ok(AzureAuth::SharedKey {
                    account: account.clone(),
                    key,
                })
            }
            (_, _, Some(token)) => Ok(AzureAuth::Sas {
                token: token.clone(),
            }),
            _ => Err(BlobError::Config(
                "Connection string has neither AccountName/AccountKey nor SharedAccessSignature"
                    .to_string(),
            )),
        }
    }
}

/// How requests to the blob service are authorized
pub enum AzureAuth {
    /// Shared Key signing with the account key
    SharedKey {
        /// Storage account name
        account: String,
        /// Decoded account key
        key: Vec<u8>,
    },
    /// SAS token appended to every request URL
    Sas {
        /// Token query string without the leading `?`
        token: String,
    },
    /// Bearer tokens from the first working Entra ID source
    Token(TokenCredential),
}

impl fmt::Debug for AzureAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey { account, .. } => write!(f, "SharedKey({account})"),
            Self::Sas { .. } => write!(f, "Sas"),
            Self::Token(credential) => write!(f, "Token({credential:?})"),
        }
    }
}
