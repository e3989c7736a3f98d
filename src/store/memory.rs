use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ObjectInfo, RemoteStore, StoreError};

/// In-memory bucket for testing. Counts transfers and can be told to fail.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    lists: AtomicUsize,
    failing_keys: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(key.into(), data.into());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Make every get/put of `key` fail with a network error
    pub fn fail_on(&self, key: impl Into<String>) {
        self.failing_keys.lock().unwrap().push(key.into());
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Total number of calls that reached the store
    pub fn call_count(&self) -> usize {
        self.get_count() + self.put_count() + self.list_count()
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.failing_keys.lock().unwrap().iter().any(|k| k == key) {
            return Err(StoreError::Network(format!("injected failure for {}", key)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    fn bucket_name(&self) -> &str {
        "memory"
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
                last_modified: None,
            })
            .collect())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(key)?;
        self.object(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check(key)?;
        self.insert(key, data);
        Ok(())
    }
}
