use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{ObjectInfo, ObjectStore, StorageError};

/// In-memory object store keyed like a bucket
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects.lock().await.insert(key.into(), body.into());
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let objects = self.objects.lock().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, body)| ObjectInfo {
                key: key.clone(),
                size: body.len() as u64,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().await;
        let body = objects
            .get(source)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(source.to_string()))?;
        objects.insert(dest.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().await.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_prefix_scoped_and_sorted() {
        let store = MemoryObjectStore::new();
        store.insert("a/2.xml", "bb").await;
        store.insert("a/1.xml", "a").await;
        store.insert("ab/3.xml", "c").await;
        store.insert("b/4.xml", "d").await;

        let listed = store.list("a/").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1.xml", "a/2.xml"]);
        assert_eq!(listed[1].size, 2);
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let store = MemoryObjectStore::new();
        let err = store.copy("nope.xml", "dest.xml").await.unwrap_err();
        assert_eq!(err, StorageError::NotFound("nope.xml".into()));
        assert!(!store.exists("dest.xml").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryObjectStore::new();
        store.insert("x", "1").await;
        store.delete("x").await.unwrap();
        store.delete("x").await.unwrap();
        assert!(store.keys().await.is_empty());
    }
}
