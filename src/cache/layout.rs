//! Local Cache Layout
//!
//! Mirrors remote keys onto disk under a fixed root:
//! `<category>/<relative>` ⇄ `<root>/<category>/<relative>`.
//! Presence of a file is the only cache signal; there is no eviction,
//! freshness check or checksum.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use super::category::Category;
use crate::sync::SyncError;

/// What to do when an object's parent directory is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryPolicy {
    /// Create the directory, then check and write the file in the same pass
    #[default]
    CreateThenFetch,
    /// Create the directory and stop there for that object; the file is
    /// only written on a later pass once the directory exists
    Deferred,
}

impl DirectoryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryPolicy::CreateThenFetch => "create-then-fetch",
            DirectoryPolicy::Deferred => "deferred",
        }
    }
}

impl FromStr for DirectoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create-then-fetch" => Ok(DirectoryPolicy::CreateThenFetch),
            "deferred" => Ok(DirectoryPolicy::Deferred),
            other => Err(other.to_string()),
        }
    }
}

/// Key of an object in the remote store, always `<category>/<relative>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteKey {
    category: Category,
    relative: String,
}

impl RemoteKey {
    /// Build a key from a category and a `/`-separated relative path
    pub fn new(category: Category, relative: &str) -> Result<Self, SyncError> {
        let invalid = |reason: &'static str| SyncError::InvalidKey {
            key: format!("{}/{}", category, relative),
            reason,
        };

        if relative.is_empty() {
            return Err(invalid("empty path"));
        }
        if relative.contains('\\') {
            return Err(invalid("backslash in path"));
        }
        for segment in relative.split('/') {
            match segment {
                "" => return Err(invalid("empty path segment")),
                "." | ".." => return Err(invalid("relative path segment")),
                _ => {}
            }
        }

        Ok(Self {
            category,
            relative: relative.to_string(),
        })
    }

    /// Key for a local file uploaded into a category: `<category>/<basename>`
    pub fn for_file(category: Category, local_path: &Path) -> Result<Self, SyncError> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SyncError::InvalidFileName(local_path.display().to_string()))?;
        Self::new(category, name)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Path below the category prefix
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.relative)
    }
}

impl FromStr for RemoteKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, relative) = s.split_once('/').ok_or_else(|| SyncError::InvalidKey {
            key: s.to_string(),
            reason: "missing category prefix",
        })?;
        let category = prefix.parse::<Category>()?;
        Self::new(category, relative)
    }
}

/// Maps categories and remote keys to paths under the cache root
#[derive(Debug, Clone)]
pub struct CacheLayout {
    /// Root directory for cached files
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the cache root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a category's files
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.as_str())
    }

    /// Convert a remote key to its local cache path
    pub fn local_path(&self, key: &RemoteKey) -> PathBuf {
        let mut path = self.category_dir(key.category());
        path.extend(key.relative().split('/'));
        path
    }

    /// Convert a local cache path back to its remote key
    ///
    /// Returns `None` for paths outside the root or not under a category.
    pub fn remote_key(&self, path: &Path) -> Option<RemoteKey> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        parts.join("/").parse().ok()
    }
}

/// Whether a path's parent directory is missing
pub fn parent_missing(path: &Path) -> bool {
    path.parent().map(|p| !p.is_dir()).unwrap_or(false)
}

/// Create a directory tree under the cache root
pub fn create_dir(dir: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dir).map_err(|source| SyncError::Filesystem {
        path: dir.to_path_buf(),
        source,
    })?;
    debug!(dir = %dir.display(), "Created cache directory");
    Ok(())
}

/// Create the parent directory tree of `path`
pub fn create_parent(path: &Path) -> Result<(), SyncError> {
    match path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

/// Write `data` to `path` unless a file is already there
///
/// The bytes go to a temp file in the same directory which is then moved
/// into place without replacing an existing file. Returns `false` if the
/// path was already taken.
pub fn write_new(path: &Path, data: &[u8]) -> Result<bool, SyncError> {
    let fs_err = |source: io::Error| SyncError::Filesystem {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(fs_err)?;
    tmp.write_all(data).map_err(fs_err)?;
    tmp.as_file().sync_all().map_err(fs_err)?;

    match tmp.persist_noclobber(path) {
        Ok(_) => {
            debug!(local = %path.display(), size = data.len(), "Stored file in cache");
            Ok(true)
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(fs_err(e.error)),
    }
}

/// MIME type sent with uploads, from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("geojson") => "application/geo+json",
        Some("json") => "application/json",
        Some("grib") | Some("grib2") => "application/x-grib",
        _ => "application/octet-stream",
    }
}
