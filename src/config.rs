//! Process configuration
//!
//! Read once at startup and passed explicitly to the components that need
//! it. Nothing here is global.

use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::cache::DirectoryPolicy;

/// Default bucket holding all Tree Tracker datasets
pub const DEFAULT_BUCKET: &str = "tree-tracker-store";

/// Default signing region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default local cache root, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default socket path for IPC communication
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tree-tracker-sync.sock";

/// Access/secret key pair; either half may be missing
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: non_empty(Some(access_key.into())),
            secret_key: non_empty(Some(secret_key.into())),
        }
    }

    /// Both halves, if both are present
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Remote store connection settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub credentials: Credentials,
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint; `None` means AWS
    pub endpoint: Option<String>,
}

impl StoreConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
        }
    }
}

/// Everything the sync service needs at startup
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub store: StoreConfig,
    /// Local cache root
    pub data_root: PathBuf,
    pub directory_policy: DirectoryPolicy,
    pub socket_path: PathBuf,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First non-empty value among `names`, in order
fn first_of<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|n| non_empty(lookup(n)))
}

impl SyncConfig {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory (or any parent) is applied
    /// first; variables already set in the environment take precedence.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials {
            access_key: first_of(&lookup, &["AWS_ACCESS_KEY_ID", "ACCESS_KEY"]),
            secret_key: first_of(&lookup, &["AWS_SECRET_ACCESS_KEY", "SECRET_KEY"]),
        };

        let store = StoreConfig {
            credentials,
            bucket: first_of(&lookup, &["TREE_TRACKER_BUCKET"])
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            region: first_of(&lookup, &["AWS_REGION", "AWS_DEFAULT_REGION"])
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: first_of(&lookup, &["TREE_TRACKER_ENDPOINT"]),
        };

        let directory_policy = match first_of(&lookup, &["TREE_TRACKER_DIR_POLICY"]) {
            Some(value) => value
                .parse()
                .map_err(|_| anyhow!("Unknown TREE_TRACKER_DIR_POLICY '{}'", value))?,
            None => DirectoryPolicy::default(),
        };

        Ok(Self {
            store,
            data_root: first_of(&lookup, &["TREE_TRACKER_DATA_DIR"])
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            directory_policy,
            socket_path: first_of(&lookup, &["TREE_TRACKER_SOCKET"])
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
        })
    }
}
