//! Remote store error types
//!
//! Maps HTTP status codes and S3 error codes to specific variants so the
//! sync layer can tell configuration problems from transport failures.

use serde::Deserialize;

/// Remote store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No credentials configured for the remote store")]
    MissingCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// S3 `<Error>` document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

impl StoreError {
    /// Whether this error comes from configuration rather than the wire
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::MissingCredentials)
    }

    /// Create a StoreError from an HTTP status code and response body
    ///
    /// S3 error bodies are XML; when the body parses, the error code and
    /// message replace the raw body in the variant's detail.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = match quick_xml::de::from_str::<ErrorBody>(body) {
            Ok(err) if err.message.is_empty() => err.code,
            Ok(err) => format!("{}: {}", err.code, err.message),
            Err(_) => body.to_string(),
        };

        match status {
            401 | 403 => StoreError::Forbidden(detail),
            404 => StoreError::NotFound(detail),
            408 => StoreError::Timeout,
            500..=599 => StoreError::Server(status, detail),
            _ => StoreError::Request(format!("HTTP {}: {}", status, detail)),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            StoreError::Network(err.to_string())
        } else {
            StoreError::Request(err.to_string())
        }
    }
}
