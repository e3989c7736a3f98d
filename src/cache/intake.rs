//! Upload Intake
//!
//! Stages a user-submitted file in the local cache before it is pushed to
//! the remote store. The first save of a name wins; later saves of the
//! same name leave the cached bytes untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::category::Category;
use super::layout::{self, CacheLayout, DirectoryPolicy, RemoteKey};
use crate::sync::SyncError;

/// A file as received from the dashboard: a name and its bytes
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Result of staging a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "path", rename_all = "camelCase")]
pub enum SaveOutcome {
    /// Bytes were written to this path
    Created(PathBuf),
    /// A file already existed at this path and was left as is
    AlreadyExists(PathBuf),
    /// Only the directory was created (deferred policy); nothing written
    DirectoryCreated(PathBuf),
}

impl SaveOutcome {
    /// Path of the cached file, if one is there to upload
    pub fn cached_path(&self) -> Option<&Path> {
        match self {
            SaveOutcome::Created(path) | SaveOutcome::AlreadyExists(path) => Some(path),
            SaveOutcome::DirectoryCreated(_) => None,
        }
    }
}

/// Writes uploaded files into the cache layout
#[derive(Debug, Clone)]
pub struct CacheIntake {
    layout: CacheLayout,
    policy: DirectoryPolicy,
}

impl CacheIntake {
    pub fn new(layout: CacheLayout, policy: DirectoryPolicy) -> Self {
        Self { layout, policy }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Stage a file at `<root>/<category>/<file name>`
    ///
    /// The name must be a single path component, and drone images must be
    /// PNG or JPEG. Both checks run before anything touches the disk.
    pub fn save_to_cache(
        &self,
        file: &UploadedFile,
        category: Category,
    ) -> Result<SaveOutcome, SyncError> {
        if file.name.contains('/') || file.name.contains('\\') {
            return Err(SyncError::InvalidFileName(file.name.clone()));
        }
        let key = RemoteKey::new(category, &file.name)
            .map_err(|_| SyncError::InvalidFileName(file.name.clone()))?;
        if !category.accepts(&file.name) {
            return Err(SyncError::RejectedFileType {
                file_name: file.name.clone(),
                category,
            });
        }

        let path = self.layout.local_path(&key);

        if layout::parent_missing(&path) {
            layout::create_parent(&path)?;
            if self.policy == DirectoryPolicy::Deferred {
                debug!(path = %path.display(), "Directory created, file save deferred");
                return Ok(SaveOutcome::DirectoryCreated(path));
            }
        }

        if path.exists() {
            debug!(path = %path.display(), "File already cached, keeping first save");
            return Ok(SaveOutcome::AlreadyExists(path));
        }

        if layout::write_new(&path, &file.contents)? {
            info!(
                path = %path.display(),
                size = file.contents.len(),
                "Saved upload to cache"
            );
            Ok(SaveOutcome::Created(path))
        } else {
            // Another writer got there between the check and the write
            Ok(SaveOutcome::AlreadyExists(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn intake(dir: &TempDir, policy: DirectoryPolicy) -> CacheIntake {
        CacheIntake::new(CacheLayout::new(dir.path().join("data")), policy)
    }

    #[test]
    fn test_save_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir, DirectoryPolicy::CreateThenFetch);
        let file = UploadedFile::new("site-a.png", b"\x89PNG".to_vec());

        let outcome = intake.save_to_cache(&file, Category::Drone).unwrap();
        let expected = dir.path().join("data").join("drone").join("site-a.png");
        assert_eq!(outcome, SaveOutcome::Created(expected.clone()));
        assert_eq!(fs::read(&expected).unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_save_is_first_write_wins() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir, DirectoryPolicy::CreateThenFetch);

        let first = UploadedFile::new("site-a.jpg", b"first".to_vec());
        let second = UploadedFile::new("site-a.jpg", b"second".to_vec());

        let path = match intake.save_to_cache(&first, Category::Drone).unwrap() {
            SaveOutcome::Created(path) => path,
            other => panic!("Expected Created, got {:?}", other),
        };
        assert_eq!(
            intake.save_to_cache(&second, Category::Drone).unwrap(),
            SaveOutcome::AlreadyExists(path.clone())
        );
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn test_deferred_policy_only_creates_directory_first() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir, DirectoryPolicy::Deferred);
        let file = UploadedFile::new("site-b.png", b"img".to_vec());

        let outcome = intake.save_to_cache(&file, Category::Drone).unwrap();
        let path = dir.path().join("data").join("drone").join("site-b.png");
        assert_eq!(outcome, SaveOutcome::DirectoryCreated(path.clone()));
        assert!(outcome.cached_path().is_none());
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());

        // Second call finds the directory and writes
        assert_eq!(
            intake.save_to_cache(&file, Category::Drone).unwrap(),
            SaveOutcome::Created(path.clone())
        );
        assert_eq!(fs::read(&path).unwrap(), b"img");
    }

    #[test]
    fn test_rejects_path_like_names_before_io() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir, DirectoryPolicy::CreateThenFetch);

        for name in ["../escape.png", "nested/a.png", "..", "", "a\\b.png"] {
            let err = intake
                .save_to_cache(&UploadedFile::new(name, b"x".to_vec()), Category::Drone)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "name {:?}", name);
        }
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_rejects_non_image_drone_upload() {
        let dir = TempDir::new().unwrap();
        let intake = intake(&dir, DirectoryPolicy::CreateThenFetch);

        let err = intake
            .save_to_cache(&UploadedFile::new("ortho.tif", b"x".to_vec()), Category::Drone)
            .unwrap_err();
        assert!(matches!(err, SyncError::RejectedFileType { .. }));
        assert!(!dir.path().join("data").exists());

        // Other categories take any file type
        let outcome = intake
            .save_to_cache(&UploadedFile::new("ortho.tif", b"x".to_vec()), Category::Planet)
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Created(_)));
    }

    #[test]
    fn test_write_failure_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        // A regular file where the category directory should be
        fs::write(root.join("drone"), b"not a dir").unwrap();

        let intake = CacheIntake::new(CacheLayout::new(&root), DirectoryPolicy::CreateThenFetch);
        let err = intake
            .save_to_cache(&UploadedFile::new("a.png", b"x".to_vec()), Category::Drone)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_string(&SaveOutcome::AlreadyExists(PathBuf::from(
            "data/drone/a.png",
        )))
        .unwrap();
        assert_eq!(json, r#"{"status":"alreadyExists","path":"data/drone/a.png"}"#);
    }
}
