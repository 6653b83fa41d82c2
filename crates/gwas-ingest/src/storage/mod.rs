//! Object storage access
//!
//! Everything that touches buckets goes through the [`ObjectStore`] trait so
//! the transfer engine and the crawler can run against the S3-compatible
//! client in production and [`InMemoryObjectStore`] in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

pub mod config;
pub mod crawler;
pub mod glob;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use crawler::{SummaryStatisticsCrawler, SyncedFiles};
pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: gs://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Storage request failed for {operation} on gs://{bucket}/{key}: {message}")]
    Request {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to read object body: {0}")]
    Body(String),

    #[error("Invalid storage configuration: {0}")]
    Configuration(String),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error(transparent)]
    Uri(#[from] gwas_common::UriError),
}

impl StorageError {
    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Request { .. } | StorageError::Body(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// Hex SHA-256 of the uploaded bytes
    pub checksum: String,
}

impl UploadResult {
    pub fn new(bucket: &str, key: &str, data: &[u8]) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len() as u64,
            checksum: gwas_common::checksum::sha256_hex(data),
        }
    }

    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.key)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Every key in `bucket` starting with `prefix`, in lexicographic order
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Single write; replaces any existing object at `key`
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<UploadResult>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        (**self).list(bucket, prefix).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        (**self).get(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<UploadResult> {
        (**self).put(bucket, key, data).await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        (**self).bucket_exists(bucket).await
    }
}
