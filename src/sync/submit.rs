//! Submission: stage uploaded files in the cache, then push each to the store
//!
//! This is the flow behind the dashboard's upload page. A batch is only
//! reported successful if every file reached the store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::engine::SyncEngine;
use super::errors::{ErrorKind, SyncError};
use crate::cache::{CacheIntake, Category, SaveOutcome, UploadedFile};
use crate::config::SyncConfig;
use crate::store::RemoteStore;

/// What happened to one file of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FileStatus {
    /// Staged (or already cached) and pushed to `key`
    #[serde(rename_all = "camelCase")]
    Uploaded { key: String, already_cached: bool },
    /// Only the cache directory was created; nothing was pushed
    NotStaged,
    Failed { kind: ErrorKind, error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSubmission {
    pub file_name: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub category: Category,
    pub files: Vec<FileSubmission>,
}

impl SubmissionReport {
    /// True only if every file in the batch was uploaded
    pub fn all_uploaded(&self) -> bool {
        !self.files.is_empty()
            && self
                .files
                .iter()
                .all(|f| matches!(f.status, FileStatus::Uploaded { .. }))
    }
}

/// Engine and intake sharing one cache layout and policy
pub struct SyncService {
    engine: SyncEngine,
    intake: CacheIntake,
}

impl SyncService {
    pub fn new(store: Arc<dyn RemoteStore>, config: &SyncConfig) -> Self {
        let layout = crate::cache::CacheLayout::new(&config.data_root);
        Self {
            engine: SyncEngine::new(store, layout.clone(), config.directory_policy),
            intake: CacheIntake::new(layout, config.directory_policy),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn intake(&self) -> &CacheIntake {
        &self.intake
    }

    /// Stage and upload each file in turn
    ///
    /// A failing file does not stop the rest of the batch.
    pub async fn submit(&self, files: &[UploadedFile], category: Category) -> SubmissionReport {
        let mut report = SubmissionReport {
            category,
            files: Vec::with_capacity(files.len()),
        };

        for file in files {
            let status = match self.submit_one(file, category).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Submission failed");
                    FileStatus::Failed {
                        kind: e.kind(),
                        error: e.to_string(),
                    }
                }
            };
            report.files.push(FileSubmission {
                file_name: file.name.clone(),
                status,
            });
        }

        info!(
            category = %category,
            files = report.files.len(),
            success = report.all_uploaded(),
            "Submission batch complete"
        );

        report
    }

    async fn submit_one(
        &self,
        file: &UploadedFile,
        category: Category,
    ) -> Result<FileStatus, SyncError> {
        let outcome = self.intake.save_to_cache(file, category)?;
        let already_cached = matches!(outcome, SaveOutcome::AlreadyExists(_));

        let Some(path) = outcome.cached_path() else {
            return Ok(FileStatus::NotStaged);
        };

        let receipt = self.engine.upload(path, category, None).await?;
        Ok(FileStatus::Uploaded {
            key: receipt.key,
            already_cached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DirectoryPolicy;
    use crate::config::{Credentials, StoreConfig};
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn config(dir: &TempDir, policy: DirectoryPolicy) -> SyncConfig {
        SyncConfig {
            store: StoreConfig::new(Credentials::default()),
            data_root: dir.path().join("data"),
            directory_policy: policy,
            socket_path: dir.path().join("sync.sock"),
        }
    }

    #[tokio::test]
    async fn test_batch_succeeds_when_every_file_uploads() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = SyncService::new(store.clone(), &config(&dir, DirectoryPolicy::CreateThenFetch));

        let files = vec![
            UploadedFile::new("site-a.png", b"a".to_vec()),
            UploadedFile::new("site-b.jpg", b"b".to_vec()),
        ];
        let report = service.submit(&files, Category::Drone).await;

        assert!(report.all_uploaded());
        assert_eq!(store.object("drone/site-a.png"), Some(b"a".to_vec()));
        assert_eq!(store.object("drone/site-b.jpg"), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_one_bad_file_fails_the_batch_but_not_the_others() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = SyncService::new(store.clone(), &config(&dir, DirectoryPolicy::CreateThenFetch));

        let files = vec![
            UploadedFile::new("notes.txt", b"x".to_vec()),
            UploadedFile::new("site-a.png", b"a".to_vec()),
        ];
        let report = service.submit(&files, Category::Drone).await;

        assert!(!report.all_uploaded());
        assert!(matches!(
            report.files[0].status,
            FileStatus::Failed { kind: ErrorKind::InvalidInput, .. }
        ));
        assert!(matches!(report.files[1].status, FileStatus::Uploaded { .. }));
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_deferred_first_file_is_not_uploaded() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = SyncService::new(store.clone(), &config(&dir, DirectoryPolicy::Deferred));

        let files = vec![
            UploadedFile::new("site-a.png", b"a".to_vec()),
            UploadedFile::new("site-b.png", b"b".to_vec()),
        ];
        let report = service.submit(&files, Category::Drone).await;

        assert!(!report.all_uploaded());
        assert!(matches!(report.files[0].status, FileStatus::NotStaged));
        assert!(matches!(report.files[1].status, FileStatus::Uploaded { .. }));
        assert_eq!(store.object("drone/site-a.png"), None);
    }

    #[tokio::test]
    async fn test_resubmitting_pushes_the_cached_bytes() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = SyncService::new(store.clone(), &config(&dir, DirectoryPolicy::CreateThenFetch));

        service
            .submit(&[UploadedFile::new("a.png", b"first".to_vec())], Category::Drone)
            .await;
        let report = service
            .submit(&[UploadedFile::new("a.png", b"second".to_vec())], Category::Drone)
            .await;

        assert!(matches!(
            report.files[0].status,
            FileStatus::Uploaded { already_cached: true, .. }
        ));
        assert_eq!(store.object("drone/a.png"), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_a_success() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = SyncService::new(store, &config(&dir, DirectoryPolicy::CreateThenFetch));

        assert!(!service.submit(&[], Category::Drone).await.all_uploaded());
    }

    #[test]
    fn test_file_status_json() {
        let submission = FileSubmission {
            file_name: "a.png".into(),
            status: FileStatus::Uploaded {
                key: "drone/a.png".into(),
                already_cached: false,
            },
        };
        assert_eq!(
            serde_json::to_string(&submission).unwrap(),
            r#"{"fileName":"a.png","status":"uploaded","key":"drone/a.png","alreadyCached":false}"#
        );
    }
}
