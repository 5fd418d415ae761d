use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::debug;

use crate::config::StorageConfig;

#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Stores `body` as JSON under `key` and returns its public URL.
    async fn put_json(&self, key: &str, body: Vec<u8>) -> Result<String>;
}

/// S3-compatible bucket (MinIO in development).
pub struct S3ManifestStore {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl S3ManifestStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .context("Invalid storage credentials")?;
        let bucket = Bucket::new(&config.bucket, region, credentials)
            .with_context(|| format!("Failed to open bucket {}", config.bucket))?
            .with_path_style();
        Ok(Self {
            bucket,
            public_base_url: config.public_base_url(),
        })
    }
}

#[async_trait]
impl ManifestStore for S3ManifestStore {
    async fn put_json(&self, key: &str, body: Vec<u8>) -> Result<String> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &body, "application/json")
            .await
            .with_context(|| format!("Failed to upload {key}"))?;
        let status = response.status_code();
        ensure!(
            (200..300).contains(&status),
            "Upload of {key} answered with status {status}"
        );
        debug!(key, bytes = body.len(), "Manifest uploaded");
        Ok(format!("{}{key}", self.public_base_url))
    }
}
