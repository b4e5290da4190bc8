//! S3 object uploads for benchmark artifacts

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_s3::{Client, primitives::ByteStream};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info};

/// Object uploads, abstracted so publishing can be tested without AWS.
pub trait ObjectStore: Send + Sync {
    /// Upload a local file as `bucket/key`
    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// S3 client for publishing benchmark artifacts
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create an S3 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
        }
    }

    /// Upload a file to S3
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        debug!(bucket = %bucket, key = %key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{bucket}/{key}"))?;

        info!(bucket = %bucket, key = %key, "Uploaded file");
        Ok(())
    }

    /// Whether an object exists
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .is_some_and(|se| se.is_not_found());
                if not_found {
                    Ok(false)
                } else {
                    Err(e).context("Failed to check object")
                }
            }
        }
    }

    /// Delete a single object
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!(bucket = %bucket, key = %key, "Deleting object");
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("Failed to delete object")?;
        Ok(())
    }
}

impl ObjectStore for S3Client {
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        S3Client::upload_file(self, bucket, key, path, content_type).await
    }
}
