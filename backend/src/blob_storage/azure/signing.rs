//! Shared Key request signing
//!
//! String-to-sign layout for service version 2015-02-21 and later:
//!
//! ```text
//! VERB\n
//! Content-Encoding\n
//! Content-Language\n
//! Content-Length\n
//! Content-MD5\n
//! Content-Type\n
//! Date\n
//! If-Modified-Since\n
//! If-Match\n
//! If-None-Match\n
//! If-Unmodified-Since\n
//! Range\n
//! CanonicalizedHeaders
//! CanonicalizedResource
//! ```

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::blob_storage::{BlobError, BlobResult};

type HmacSha256 = Hmac<Sha256>;

/// The parts of an outgoing request covered by the signature
#[derive(Debug)]
pub struct SignableRequest<'a> {
    /// HTTP verb
    pub method: &'a str,
    /// Full request URL including query
    pub url: &'a Url,
    /// Body length in bytes
    pub content_length: usize,
    /// `Content-Type` header value, empty if none is sent
    pub content_type: &'a str,
    /// Every `x-ms-*` header sent with the request
    pub ms_headers: &'a [(&'a str, String)],
}

/// Builds the canonical string the signature is computed over
#[must_use]
pub fn string_to_sign(account: &str, request: &SignableRequest<'_>) -> String {
    let content_length = match request.content_length {
        0 => String::new(),
        len => len.to_string(),
    };

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        request.method,
        content_length,
        request.content_type,
        canonicalized_headers(request.ms_headers),
        canonicalized_resource(account, request.url),
    )
}

/// Computes the `Authorization` header value for a request
///
/// # Errors
///
/// Returns `BlobError::Config` if the key cannot be used as an HMAC key
pub fn authorization(account: &str, key: &[u8], request: &SignableRequest<'_>) -> BlobResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BlobError::Config(format!("HMAC key error: {e}")))?;
    mac.update(string_to_sign(account, request).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKey {account}:{signature}"))
}

fn canonicalized_headers(headers: &[(&str, String)]) -> String {
    let sorted: BTreeMap<String, &str> = headers
        .iter()
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .collect();

    sorted
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{name}:{}", values.join(",")));
    }

    resource
}
