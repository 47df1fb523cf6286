//! Azure Blob Storage backend over the Blob REST API
mod credentials;
mod identity;
mod listing;
mod signing;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use url::Url;

pub use credentials::{AzureAuth, ConnectionString};
pub use identity::{TokenCredential, TokenSource};

use super::{BlobError, BlobResult, BlobStore};
use signing::SignableRequest;

/// REST API version sent with every request
pub const AZURE_API_VERSION: &str = "2023-11-03";

const CONTAINER_EXISTS_CODE: &str = "ContainerAlreadyExists";

/// Blob store for a single Azure container
pub struct AzureBlobStore {
    client: reqwest::Client,
    container: String,
    container_url: Url,
    container_url_str: String,
    auth: AzureAuth,
}

impl AzureBlobStore {
    /// Creates a store for `container` under the given blob service endpoint
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Config` if the endpoint is not a valid base URL
    pub fn new(
        client: reqwest::Client,
        blob_endpoint: &str,
        container: String,
        auth: AzureAuth,
    ) -> BlobResult<Self> {
        let mut container_url = Url::parse(blob_endpoint.trim_end_matches('/'))
            .map_err(|e| BlobError::Config(format!("Invalid blob endpoint {blob_endpoint}: {e}")))?;
        container_url
            .path_segments_mut()
            .map_err(|()| BlobError::Config(format!("Blob endpoint cannot be a base: {blob_endpoint}")))?
            .pop_if_empty()
            .push(&container);

        tracing::info!(
            "Initialized Azure blob store for container {} at {} using {:?} auth",
            container,
            container_url,
            auth
        );

        Ok(Self {
            client,
            container_url_str: container_url.as_str().trim_end_matches('/').to_string(),
            container_url,
            container,
            auth,
        })
    }

    /// Creates a store from an account connection string
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Config` if the connection string is unusable
    pub fn from_connection_string(
        client: reqwest::Client,
        connection_string: &str,
        container: String,
    ) -> BlobResult<Self> {
        let parsed = ConnectionString::parse(connection_string)?;
        let auth = parsed.auth()?;
        Self::new(client, &parsed.blob_endpoint, container, auth)
    }

    /// Creates a store for `account_url` authorized by bearer tokens from
    /// the environment's credential chain
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Config` if the account URL is invalid
    pub fn with_token_credential(
        client: reqwest::Client,
        account_url: &str,
        container: String,
    ) -> BlobResult<Self> {
        let auth = AzureAuth::Token(TokenCredential::from_env());
        Self::new(client, account_url, container, auth)
    }

    fn blob_url(&self, key: &str) -> BlobResult<Url> {
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|()| BlobError::Config("Container URL cannot be a base".to_string()))?
            .push(key);
        Ok(url)
    }

    fn container_op_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.container_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    /// Sends a request with versioning, date and authorization applied
    async fn send(
        &self,
        method: Method,
        mut url: Url,
        mut ms_headers: Vec<(&'static str, String)>,
        body: Option<(Bytes, &str)>,
    ) -> BlobResult<reqwest::Response> {
        ms_headers.push(("x-ms-version", AZURE_API_VERSION.to_string()));
        ms_headers.push((
            "x-ms-date",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        ));

        let authorization = match &self.auth {
            AzureAuth::SharedKey { account, key } => {
                let (content_length, content_type) = body
                    .as_ref()
                    .map_or((0, ""), |(bytes, content_type)| (bytes.len(), *content_type));
                Some(signing::authorization(
                    account,
                    key,
                    &SignableRequest {
                        method: method.as_str(),
                        url: &url,
                        content_length,
                        content_type,
                        ms_headers: &ms_headers,
                    },
                )?)
            }
            AzureAuth::Sas { token } => {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
                    _ => token.clone(),
                };
                url.set_query(Some(&query));
                None
            }
            AzureAuth::Token(credential) => {
                Some(format!("Bearer {}", credential.token(&self.client).await?))
            }
        };

        let mut request = self.client.request(method, url);
        for (name, value) in ms_headers {
            request = request.header(name, value);
        }
        if let Some(authorization) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        if let Some((bytes, content_type)) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes);
        }

        Ok(request.send().await?)
    }

    /// Converts a non-success response into a storage error
    async fn failure(op: &str, response: reqwest::Response) -> BlobError {
        let status = response.status();
        let code = error_code(&response).unwrap_or_default();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Azure {op} failed with HTTP {status}: {body}");
        BlobError::StorageUnavailable(format!("Azure {op}: HTTP {status} {code}"))
    }
}

fn error_code(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn container_url(&self) -> &str {
        &self.container_url_str
    }

    async fn ensure_container(&self) -> BlobResult<()> {
        let url = self.container_op_url(&[("restype", "container")]);
        let response = self.send(Method::PUT, url, Vec::new(), None).await?;

        if response.status().is_success() {
            return Ok(());
        }

        if response.status() == StatusCode::CONFLICT
            && error_code(&response).as_deref() == Some(CONTAINER_EXISTS_CODE)
        {
            return Err(BlobError::ContainerExists(self.container.clone()));
        }

        Err(Self::failure("create container", response).await)
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<String> {
        let url = self.blob_url(key)?;
        let size = bytes.len();
        let response = self
            .send(
                Method::PUT,
                url,
                vec![("x-ms-blob-type", "BlockBlob".to_string())],
                Some((bytes, content_type)),
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure("put blob", response).await);
        }

        tracing::debug!("Uploaded blob {key} ({size} bytes, {content_type})");
        Ok(self.object_url(key))
    }

    async fn list(&self) -> BlobResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut params = vec![("restype", "container"), ("comp", "list")];
            if let Some(marker) = marker.as_deref() {
                params.push(("marker", marker));
            }
            let url = self.container_op_url(&params);

            let response = self.send(Method::GET, url, Vec::new(), None).await?;
            if !response.status().is_success() {
                return Err(Self::failure("list blobs", response).await);
            }

            let page = listing::parse_list_blobs(&response.text().await?)?;
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_bytes, header, header_exists, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::blob_storage::ensure_container_exists;

    fn store(endpoint: &str) -> AzureBlobStore {
        AzureBlobStore::new(
            reqwest::Client::new(),
            endpoint,
            "lanternfly-images".to_string(),
            AzureAuth::Sas {
                token: "sv=1&sig=x".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_container_url() {
        let store = store("https://photos.blob.core.windows.net/");
        assert_eq!(
            store.container_url(),
            "https://photos.blob.core.windows.net/lanternfly-images"
        );
        assert_eq!(
            store.object_url("20240101T000000-cat.png"),
            "https://photos.blob.core.windows.net/lanternfly-images/20240101T000000-cat.png"
        );
    }

    #[test]
    fn test_container_url_with_path_style_endpoint() {
        let store = store("http://127.0.0.1:10000/devstoreaccount1");
        assert_eq!(
            store.container_url(),
            "http://127.0.0.1:10000/devstoreaccount1/lanternfly-images"
        );
    }

    #[test]
    fn test_blob_url_encodes_key() {
        let store = store("https://photos.blob.core.windows.net");
        let url = store.blob_url("a b.png").unwrap();
        assert_eq!(url.path(), "/lanternfly-images/a%20b.png");
    }

    #[test]
    fn test_container_op_url() {
        let store = store("https://photos.blob.core.windows.net");
        let url = store.container_op_url(&[("restype", "container"), ("comp", "list")]);
        assert_eq!(
            url.as_str(),
            "https://photos.blob.core.windows.net/lanternfly-images?restype=container&comp=list"
        );
    }

    #[test]
    fn test_from_connection_string() {
        let store = AzureBlobStore::from_connection_string(
            reqwest::Client::new(),
            "AccountName=photos;AccountKey=c2VjcmV0",
            "images".to_string(),
        )
        .unwrap();
        assert_eq!(
            store.container_url(),
            "https://photos.blob.core.windows.net/images"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = AzureBlobStore::new(
            reqwest::Client::new(),
            "not a url",
            "images".to_string(),
            AzureAuth::Sas {
                token: String::new(),
            },
        );
        assert!(matches!(result, Err(BlobError::Config(_))));
    }

    fn mock_store(mock_server: &MockServer) -> AzureBlobStore {
        AzureBlobStore::new(
            reqwest::Client::new(),
            &mock_server.uri(),
            "lanternfly-images".to_string(),
            AzureAuth::Sas {
                token: "sv=2022-11-02&sig=abc".to_string(),
            },
        )
        .unwrap()
    }

    async fn mount_create_container(mock_server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("PUT"))
            .and(path("/lanternfly-images"))
            .and(query_param("restype", "container"))
            .and(query_param("sig", "abc"))
            .and(header("x-ms-version", AZURE_API_VERSION))
            .and(header_exists("x-ms-date"))
            .respond_with(response)
            .expect(1)
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_ensure_container_created() {
        let mock_server = MockServer::start().await;
        mount_create_container(&mock_server, ResponseTemplate::new(201)).await;

        let store = mock_store(&mock_server);
        assert!(store.ensure_container().await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_container_already_exists() {
        let mock_server = MockServer::start().await;
        mount_create_container(
            &mock_server,
            ResponseTemplate::new(409).insert_header("x-ms-error-code", "ContainerAlreadyExists"),
        )
        .await;

        let store = mock_store(&mock_server);
        assert!(matches!(
            store.ensure_container().await,
            Err(BlobError::ContainerExists(container)) if container == "lanternfly-images"
        ));
    }

    #[tokio::test]
    async fn test_startup_accepts_existing_container() {
        let mock_server = MockServer::start().await;
        mount_create_container(
            &mock_server,
            ResponseTemplate::new(409).insert_header("x-ms-error-code", "ContainerAlreadyExists"),
        )
        .await;

        assert!(ensure_container_exists(&mock_store(&mock_server)).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_container_other_conflict() {
        let mock_server = MockServer::start().await;
        mount_create_container(
            &mock_server,
            ResponseTemplate::new(409).insert_header("x-ms-error-code", "ContainerBeingDeleted"),
        )
        .await;

        let store = mock_store(&mock_server);
        assert!(matches!(
            ensure_container_exists(&store).await,
            Err(BlobError::StorageUnavailable(msg)) if msg.contains("ContainerBeingDeleted")
        ));
    }

    #[tokio::test]
    async fn test_ensure_container_forbidden() {
        let mock_server = MockServer::start().await;
        mount_create_container(
            &mock_server,
            ResponseTemplate::new(403)
                .insert_header("x-ms-error-code", "AuthorizationFailure")
                .set_body_string("<Error><Code>AuthorizationFailure</Code></Error>"),
        )
        .await;

        let store = mock_store(&mock_server);
        assert!(matches!(
            ensure_container_exists(&store).await,
            Err(BlobError::StorageUnavailable(msg)) if msg.contains("403")
        ));
    }

    #[tokio::test]
    async fn test_put_blob() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/lanternfly-images/20240101T000000-cat.png"))
            .and(query_param("sig", "abc"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-type", "image/png"))
            .and(header("x-ms-version", AZURE_API_VERSION))
            .and(body_bytes(b"\x89PNG fake".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = mock_store(&mock_server);
        let url = store
            .put(
                "20240101T000000-cat.png",
                Bytes::from_static(b"\x89PNG fake"),
                "image/png",
            )
            .await
            .unwrap();

        assert_eq!(
            url,
            format!("{}/lanternfly-images/20240101T000000-cat.png", mock_server.uri())
        );
    }

    #[tokio::test]
    async fn test_put_blob_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).insert_header("x-ms-error-code", "InternalError"))
            .mount(&mock_server)
            .await;

        let store = mock_store(&mock_server);
        assert!(matches!(
            store.put("a.png", Bytes::from_static(b"x"), "image/png").await,
            Err(BlobError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_put_blob_with_shared_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/photos/lanternfly-images/a.png"))
            .and(header_regex("authorization", r"^SharedKey photos:[A-Za-z0-9+/]+=*$"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = AzureBlobStore::new(
            reqwest::Client::new(),
            &format!("{}/photos", mock_server.uri()),
            "lanternfly-images".to_string(),
            AzureAuth::SharedKey {
                account: "photos".to_string(),
                key: b"secret".to_vec(),
            },
        )
        .unwrap();

        assert!(store
            .put("a.png", Bytes::from_static(b"x"), "image/png")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_list_follows_next_marker() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lanternfly-images"))
            .and(query_param("comp", "list"))
            .and(query_param("marker", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<EnumerationResults><Blobs>\
                 <Blob><Name>20240103T000000-c.png</Name></Blob>\
                 </Blobs><NextMarker /></EnumerationResults>",
            ))
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/lanternfly-images"))
            .and(query_param("restype", "container"))
            .and(query_param("comp", "list"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<EnumerationResults><Blobs>\
                 <Blob><Name>20240101T000000-a.png</Name></Blob>\
                 <Blob><Name>20240102T000000-b.png</Name></Blob>\
                 </Blobs><NextMarker>page-2</NextMarker></EnumerationResults>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = mock_store(&mock_server);
        assert_eq!(
            store.list().await.unwrap(),
            vec![
                "20240101T000000-a.png",
                "20240102T000000-b.png",
                "20240103T000000-c.png"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            mock_store(&mock_server).list().await,
            Err(BlobError::StorageUnavailable(_))
        ));
    }
}
