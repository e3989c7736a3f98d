//! Sync Engine
//!
//! Mirrors a remote category onto the local cache and pushes single local
//! files back. Every transfer is awaited in turn; there is no concurrency
//! inside an operation and no coordination between concurrent callers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::errors::SyncError;
use crate::cache::layout::{self, CacheLayout, DirectoryPolicy, RemoteKey};
use crate::cache::Category;
use crate::store::RemoteStore;

/// What one `download` pass did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub category: Category,
    /// Keys fetched in this pass
    pub fetched: Vec<String>,
    /// Objects already present locally
    pub skipped: usize,
    /// Objects whose directory was created but which were left for a later pass
    pub deferred: Vec<String>,
    pub directories_created: usize,
    /// Remote keys that do not map to a safe local path
    pub ignored: Vec<String>,
}

impl DownloadReport {
    fn new(category: Category) -> Self {
        Self {
            category,
            fetched: Vec::new(),
            skipped: 0,
            deferred: Vec::new(),
            directories_created: 0,
            ignored: Vec::new(),
        }
    }

    /// True when at least one file was fetched
    pub fn downloaded(&self) -> bool {
        !self.fetched.is_empty()
    }

    /// True when the pass changed nothing on disk
    pub fn is_noop(&self) -> bool {
        self.fetched.is_empty() && self.directories_created == 0
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub key: String,
    pub local_path: PathBuf,
    pub size: u64,
}

/// Keeps the local cache in step with the remote store
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    layout: CacheLayout,
    policy: DirectoryPolicy,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>, layout: CacheLayout, policy: DirectoryPolicy) -> Self {
        Self {
            store,
            layout,
            policy,
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn policy(&self) -> DirectoryPolicy {
        self.policy
    }

    pub fn bucket_name(&self) -> &str {
        self.store.bucket_name()
    }

    /// Download every missing object of a category given by name
    ///
    /// Unknown names are rejected before any I/O.
    pub async fn download_str(&self, category: &str) -> Result<DownloadReport, SyncError> {
        let category: Category = category.parse()?;
        self.download(category).await
    }

    /// Download every object under `<category>/` that is not cached yet
    ///
    /// A file that exists locally is never fetched again, whatever its
    /// content. The pass stops at the first failed transfer; files fetched
    /// before it stay on disk.
    pub async fn download(&self, category: Category) -> Result<DownloadReport, SyncError> {
        let prefix = category.prefix();
        let objects = self
            .store
            .list_prefix(&prefix)
            .await
            .map_err(|source| SyncError::Transport {
                key: prefix.clone(),
                source,
            })?;

        debug!(category = %category, count = objects.len(), "Listed remote objects");

        let mut report = DownloadReport::new(category);

        for object in objects {
            // Markers only shape the directory tree, they are never files
            if object.is_directory() {
                match self.marker_dir(category, &object.key) {
                    Some(dir) if !dir.is_dir() => {
                        layout::create_dir(&dir)?;
                        report.directories_created += 1;
                    }
                    Some(_) => {}
                    None => {
                        warn!(key = %object.key, "Skipping directory marker with unusable key");
                        report.ignored.push(object.key);
                    }
                }
                continue;
            }

            let key = match object.key.parse::<RemoteKey>() {
                Ok(key) if key.category() == category => key,
                _ => {
                    warn!(key = %object.key, "Skipping remote object with unusable key");
                    report.ignored.push(object.key);
                    continue;
                }
            };

            let local_path = self.layout.local_path(&key);

            if layout::parent_missing(&local_path) {
                layout::create_parent(&local_path)?;
                report.directories_created += 1;

                if self.policy == DirectoryPolicy::Deferred {
                    debug!(key = %key, "Directory created, download deferred");
                    report.deferred.push(key.to_string());
                    continue;
                }
            }

            if local_path.is_file() {
                debug!(key = %key, "File cache HIT");
                report.skipped += 1;
                continue;
            }

            debug!(key = %key, size = object.size, "File cache MISS, downloading");

            let data = self
                .store
                .get_object(&object.key)
                .await
                .map_err(|source| SyncError::Transport {
                    key: object.key.clone(),
                    source,
                })?;

            if layout::write_new(&local_path, &data)? {
                report.fetched.push(key.to_string());
            } else {
                report.skipped += 1;
            }
        }

        info!(
            category = %category,
            fetched = report.fetched.len(),
            skipped = report.skipped,
            deferred = report.deferred.len(),
            "Download pass complete"
        );

        Ok(report)
    }

    /// Local directory for a marker key such as `planet/` or `planet/Bondy/`
    fn marker_dir(&self, category: Category, key: &str) -> Option<PathBuf> {
        let relative = key.strip_prefix(&category.prefix())?.trim_end_matches('/');
        if relative.is_empty() {
            return Some(self.layout.category_dir(category));
        }
        RemoteKey::new(category, relative)
            .ok()
            .map(|key| self.layout.local_path(&key))
    }

    /// Download several categories in order, stopping at the first failure
    pub async fn download_all(
        &self,
        categories: &[Category],
    ) -> Result<Vec<DownloadReport>, SyncError> {
        let mut reports = Vec::with_capacity(categories.len());
        for category in categories {
            reports.push(self.download(*category).await?);
        }
        Ok(reports)
    }

    /// Upload with a category and optional key given as strings
    ///
    /// Both are validated before the local file is even looked at.
    pub async fn upload_str(
        &self,
        local_path: &Path,
        category: &str,
        remote_key: Option<&str>,
    ) -> Result<UploadReceipt, SyncError> {
        let category: Category = category.parse()?;
        let remote_key = remote_key.map(str::parse::<RemoteKey>).transpose()?;
        self.upload(local_path, category, remote_key).await
    }

    /// Push a local file to the store
    ///
    /// Without an explicit key the object lands at `<category>/<file name>`.
    /// A missing local file fails before the store is contacted.
    pub async fn upload(
        &self,
        local_path: &Path,
        category: Category,
        remote_key: Option<RemoteKey>,
    ) -> Result<UploadReceipt, SyncError> {
        if !local_path.is_file() {
            return Err(SyncError::MissingLocalFile(local_path.to_path_buf()));
        }

        let key = match remote_key {
            Some(key) => key,
            None => RemoteKey::for_file(category, local_path)?,
        };

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|source| SyncError::Filesystem {
                path: local_path.to_path_buf(),
                source,
            })?;
        let size = data.len() as u64;
        let key_str = key.to_string();

        self.store
            .put_object(&key_str, data, layout::content_type_for(local_path))
            .await
            .map_err(|source| SyncError::Transport {
                key: key_str.clone(),
                source,
            })?;

        info!(key = %key_str, local = %local_path.display(), size = size, "Uploaded file");

        Ok(UploadReceipt {
            key: key_str,
            local_path: local_path.to_path_buf(),
            size,
        })
    }
}
