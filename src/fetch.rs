//! HTTP helpers shared by the downloading runners.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_TYPE, HeaderMap};

use crate::error::{Error, Result};

/// Read a newline-delimited url list, skipping blank lines.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Media type of a response without parameters, e.g. `image/png`.
pub fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Fail with `DisallowedType` unless `content_type` is one of `allowed`.
pub fn ensure_allowed(content_type: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&content_type) {
        Ok(())
    } else {
        Err(Error::DisallowedType {
            content_type: if content_type.is_empty() {
                "none".to_string()
            } else {
                content_type.to_string()
            },
        })
    }
}

/// A blocking client that waits as long as the server takes.
///
/// reqwest's blocking client gives up after 30 s unless told otherwise.
pub fn blocking_client() -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder().timeout(None).build()?)
}

/// A fresh, collision-free path `{dir}/{uuid}.{extension}`.
pub fn unique_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", uuid::Uuid::new_v4(), extension))
}
