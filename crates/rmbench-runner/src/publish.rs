//! Publishing results files to S3

use crate::aws::{AwsContext, ObjectStore, S3Client};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rmbench_common::naming::artifact_key;
use std::path::Path;
use tracing::info;

/// What a published artifact belongs to
#[derive(Debug, Clone, Copy)]
pub struct ArtifactMeta<'a> {
    pub project: &'a str,
    pub test_name: &'a str,
    pub setup_name: &'a str,
    pub sha: &'a str,
    pub at: DateTime<Utc>,
}

impl ArtifactMeta<'_> {
    pub fn key(&self) -> String {
        artifact_key(self.project, self.test_name, self.setup_name, self.sha, self.at)
    }
}

/// Uploads results files under the artifact key layout
pub struct ArtifactPublisher<S = S3Client> {
    store: S,
    bucket: String,
}

impl ArtifactPublisher {
    pub fn new(aws: &AwsContext, bucket: impl Into<String>) -> Self {
        Self::with_store(S3Client::from_context(aws), bucket)
    }
}

impl<S: ObjectStore> ArtifactPublisher<S> {
    pub fn with_store(store: S, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Upload `results` and return its `s3://` location
    pub async fn publish(&self, results: &Path, meta: &ArtifactMeta<'_>) -> Result<String> {
        let key = meta.key();
        self.store
            .upload_file(&self.bucket, &key, results, "application/json")
            .await?;
        let location = format!("s3://{}/{}", self.bucket, key);
        info!(location = %location, "Published results");
        Ok(location)
    }
}
