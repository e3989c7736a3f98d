//! IPC protocol definitions for dashboard communication
//!
//! Newline-delimited JSON over a Unix domain socket. Each line is one
//! command; each command gets exactly one response line.

use serde::{Deserialize, Serialize};

use crate::cache::SaveOutcome;
use crate::sync::{DownloadReport, ErrorKind, SubmissionReport, SyncError};

/// Protocol version for future compatibility
pub const PROTOCOL_VERSION: u32 = 1;

/// A file carried inline in a command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub file_name: String,
    /// Base64-encoded file bytes
    pub contents: String,
}

/// Commands sent from the dashboard to the sync service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Fetch missing objects for each category, in order
    Download { categories: Vec<String> },
    /// Push a local file to the store
    #[serde(rename_all = "camelCase")]
    Upload {
        local_path: String,
        category: String,
        #[serde(default)]
        remote_key: Option<String>,
    },
    /// Stage a file in the local cache without uploading it
    #[serde(rename_all = "camelCase")]
    SaveToCache {
        category: String,
        file_name: String,
        /// Base64-encoded file bytes
        contents: String,
    },
    /// Stage and upload a batch of files
    Submit {
        category: String,
        files: Vec<FilePayload>,
    },
    /// Get service status
    GetStatus,
}

/// Responses sent from the sync service to the dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// `downloaded` is true if any category fetched at least one file
    Downloaded {
        downloaded: bool,
        reports: Vec<DownloadReport>,
    },
    #[serde(rename_all = "camelCase")]
    Uploaded { key: String, size: u64 },
    Saved { outcome: SaveOutcome },
    Submitted {
        success: bool,
        report: SubmissionReport,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        version: u32,
        healthy: bool,
        bucket: String,
        data_root: String,
        directory_policy: String,
    },
    Error { kind: ErrorKind, error: String },
}

impl From<SyncError> for Response {
    fn from(e: SyncError) -> Self {
        Response::Error {
            kind: e.kind(),
            error: e.to_string(),
        }
    }
}

/// Parse a JSON command from bytes
pub fn parse_command(data: &[u8]) -> Result<Command, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Serialize a response to JSON bytes
pub fn serialize_response(response: &Response) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(response)?;
    json.push(b'\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_download_command() {
        let json = r#"{"type":"download","categories":["model","drone"]}"#;
        match parse_command(json.as_bytes()).unwrap() {
            Command::Download { categories } => assert_eq!(categories, vec!["model", "drone"]),
            other => panic!("Expected Download command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_upload_command_without_key() {
        let json = r#"{"type":"upload","localPath":"data/drone/a.png","category":"drone"}"#;
        match parse_command(json.as_bytes()).unwrap() {
            Command::Upload {
                local_path,
                category,
                remote_key,
            } => {
                assert_eq!(local_path, "data/drone/a.png");
                assert_eq!(category, "drone");
                assert_eq!(remote_key, None);
            }
            other => panic!("Expected Upload command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_save_to_cache_command() {
        let json = r#"{"type":"saveToCache","category":"drone","fileName":"a.png","contents":"aGVsbG8="}"#;
        match parse_command(json.as_bytes()).unwrap() {
            Command::SaveToCache {
                category,
                file_name,
                contents,
            } => {
                assert_eq!(category, "drone");
                assert_eq!(file_name, "a.png");
                assert_eq!(contents, "aGVsbG8=");
            }
            other => panic!("Expected SaveToCache command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_get_status_command() {
        let json = r#"{"type":"getStatus"}"#;
        assert!(matches!(
            parse_command(json.as_bytes()).unwrap(),
            Command::GetStatus
        ));
    }

    #[test]
    fn test_unknown_command_fails_to_parse() {
        assert!(parse_command(br#"{"type":"mount"}"#).is_err());
    }

    #[test]
    fn test_serialize_error_response_carries_kind() {
        let response = Response::from(SyncError::UnsupportedCategory("satellite".into()));
        let json = String::from_utf8(serialize_response(&response).unwrap()).unwrap();
        assert_eq!(
            json,
            "{\"type\":\"error\",\"kind\":\"invalidInput\",\"error\":\"Unsupported category: satellite\"}\n"
        );
    }

    #[test]
    fn test_serialize_saved_response() {
        let response = Response::Saved {
            outcome: SaveOutcome::Created(PathBuf::from("data/drone/a.png")),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"type":"saved","outcome":{"status":"created","path":"data/drone/a.png"}}"#
        );
    }

    #[test]
    fn test_serialize_status_response() {
        let response = Response::Status {
            version: PROTOCOL_VERSION,
            healthy: true,
            bucket: "tree-tracker-store".into(),
            data_root: "data".into(),
            directory_policy: "create-then-fetch".into(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""dataRoot":"data""#));
        assert!(json.contains(r#""directoryPolicy":"create-then-fetch""#));
    }
}
