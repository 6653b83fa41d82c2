use super::{config::StorageConfig, ObjectStore, Result, StorageError, UploadResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, error::DisplayErrorContext, primitives::ByteStream, Client};
use bytes::Bytes;
use tracing::{debug, info, instrument};

/// S3-compatible client; with the default endpoint it serves `gs://` buckets
/// through the GCS interoperability API.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        debug!(
            endpoint = ?config.endpoint,
            region = %config.region,
            path_style = config.path_style,
            "Initializing storage client"
        );

        let builder = match config.static_credentials() {
            Some((access_key, secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "gwas-ingest");
                aws_sdk_s3::Config::builder().credentials_provider(credentials)
            },
            None => {
                debug!("No static storage credentials configured, using default provider chain");
                let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        let mut builder = builder
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            if endpoint.is_empty() {
                return Err(StorageError::Configuration("empty storage endpoint".to_string()));
            }
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self::from_client(Client::from_conf(builder.build())))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn request_error<E>(
    operation: &'static str,
    bucket: &str,
    key: &str,
    err: E,
) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Request {
        operation,
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_bucket()) {
                    StorageError::BucketNotFound(bucket.to_string())
                } else {
                    request_error("ListObjectsV2", bucket, prefix, e)
                }
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }

        debug!(count = keys.len(), "Listed gs://{}/{}", bucket, prefix);
        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    request_error("GetObject", bucket, key, e)
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?
            .into_bytes();

        debug!("Downloaded {} bytes from gs://{}/{}", data.len(), bucket, key);
        Ok(data)
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<UploadResult> {
        let result = UploadResult::new(bucket, key, &data);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| request_error("PutObject", bucket, key, e))?;

        info!(
            checksum = %result.checksum,
            "Uploaded {} bytes to {}",
            result.size,
            result.uri()
        );
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(request_error("HeadBucket", bucket, "", e)),
        }
    }
}
