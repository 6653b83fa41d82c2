use super::{ObjectStore, Result, StorageError, UploadResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory object store for tests and dry runs.
///
/// Buckets must exist before objects can be written to them.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, BTreeMap<String, Bytes>>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
    }

    /// Insert an object directly, creating the bucket if needed
    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;

        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<UploadResult> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;

        let result = UploadResult::new(bucket, key, &data);
        objects.insert(key.to_string(), Bytes::from(data));
        Ok(result)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_requires_bucket() {
        let store = InMemoryObjectStore::new();
        let err = store.put("missing", "a.txt", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(_)));

        store.create_bucket("missing").await;
        assert!(store.put("missing", "a.txt", b"x".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("b").await;
        store.put("b", "k", b"first".to_vec()).await.unwrap();
        store.put("b", "k", b"second".to_vec()).await.unwrap();

        assert_eq!(store.get("b", "k").await.unwrap(), Bytes::from_static(b"second"));
        assert_eq!(store.object_count("b").await, 1);
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = InMemoryObjectStore::new();
        store.insert("b", "sumstats/GCST1/a.tsv", "1").await;
        store.insert("b", "sumstats/GCST2/b.tsv", "2").await;
        store.insert("b", "other/c.tsv", "3").await;

        let keys = store.list("b", "sumstats/").await.unwrap();
        assert_eq!(keys, vec!["sumstats/GCST1/a.tsv", "sumstats/GCST2/b.tsv"]);
        assert_eq!(store.list("b", "").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("b").await;
        assert!(matches!(
            store.get("b", "nope").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(store.bucket_exists("b").await.unwrap());
        assert!(!store.bucket_exists("c").await.unwrap());
    }
}
