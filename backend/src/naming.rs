//! Object naming for uploaded images

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Name used when sanitizing leaves nothing behind
pub const FALLBACK_NAME: &str = "upload.bin";

static UNSAFE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Invalid regex"));

/// Maps a client-supplied filename to a storage-safe token
///
/// The name is trimmed, then every maximal run of characters outside
/// `[A-Za-z0-9._-]` is collapsed into a single underscore.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let safe = UNSAFE_RUN.replace_all(name.trim(), "_");
    if safe.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        safe.into_owned()
    }
}

/// Builds the storage key `<YYYYMMDDTHHMMSS>-<sanitized filename>`
#[must_use]
pub fn object_key(now: DateTime<Utc>, filename: &str) -> String {
    format!("{}-{}", now.format("%Y%m%dT%H%M%S"), sanitize(filename))
}
