//! Parsing of List Blobs responses

use serde::Deserialize;

use crate::blob_storage::{BlobError, BlobResult};

/// One page of a List Blobs enumeration
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Blob names on this page
    pub names: Vec<String>,
    /// Continuation marker, `None` on the last page
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: Blobs,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Blobs {
    #[serde(rename = "Blob", default)]
    blob: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
struct BlobItem {
    #[serde(rename = "Name")]
    name: BlobName,
}

/// `<Name>` text, percent-encoded when the name holds characters XML cannot
#[derive(Debug, Deserialize)]
struct BlobName {
    #[serde(rename = "@Encoded", default)]
    encoded: bool,
    #[serde(rename = "$text", default)]
    value: String,
}

impl BlobName {
    fn decode(self) -> BlobResult<String> {
        if !self.encoded {
            return Ok(self.value);
        }
        urlencoding::decode(&self.value)
            .map(std::borrow::Cow::into_owned)
            .map_err(|e| BlobError::StorageUnavailable(format!("Undecodable blob name: {e}")))
    }
}

/// Extracts blob names and the continuation marker from an
/// `EnumerationResults` document
///
/// # Errors
///
/// Returns `BlobError::StorageUnavailable` if the body is not a List Blobs
/// response
pub fn parse_list_blobs(body: &str) -> BlobResult<ListPage> {
    let parsed: EnumerationResults = quick_xml::de::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|e| BlobError::StorageUnavailable(format!("Failed to parse List Blobs response: {e}")))?;

    let names = parsed
        .blobs
        .blob
        .into_iter()
        .map(|blob| blob.name.decode())
        .collect::<BlobResult<Vec<_>>>()?;

    Ok(ListPage {
        names,
        next_marker: parsed.next_marker.filter(|m| !m.is_empty()),
    })
}
