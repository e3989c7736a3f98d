//! Remote object store access
//!
//! `RemoteStore` is the seam the sync engine talks to. `S3Client` is the
//! production implementation; `MemoryStore` backs tests.

pub mod client;
pub mod errors;
pub mod signing;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use client::S3Client;
pub use errors::StoreError;
pub use types::ObjectInfo;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;

/// The three bucket operations the sync layer relies on
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable bucket name, for logs and status
    fn bucket_name(&self) -> &str;

    /// List every object whose key starts with `prefix`
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Fetch an object's full content
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `data` under `key`, replacing any existing object
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}
