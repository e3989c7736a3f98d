//! S3 API types
//!
//! ListObjectsV2 responses as returned by S3 and S3-compatible stores.

use serde::Deserialize;

/// One object from a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectInfo {
    /// Full object key within the bucket
    pub key: String,
    /// Object size in bytes
    #[serde(default)]
    pub size: u64,
    /// ISO-8601 modification time, as reported by the store
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ObjectInfo {
    /// Check if this entry is a zero-byte "folder" marker
    pub fn is_directory(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// Response from ListObjectsV2
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    /// Objects in this page (element absent when the page is empty)
    #[serde(default)]
    pub contents: Vec<ObjectInfo>,
    /// Whether another page follows
    #[serde(default)]
    pub is_truncated: bool,
    /// Token for the next page
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}
