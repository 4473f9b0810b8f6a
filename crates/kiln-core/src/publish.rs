//! Artifact publishing to remote object storage
//!
//! Every file left in the output workspace after execution is uploaded to an
//! object-storage bucket under a randomized key that preserves the original
//! extension, and resolves to a deterministic public URL. Uploads are
//! best-effort: one failed file is logged and recorded, the rest still go
//! out.

use crate::errors::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A file that has been handed over to the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub local_path: PathBuf,
    pub key: String,
    pub public_url: String,
}

/// Outcome of one upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PublishStatus {
    Uploaded { artifact: PublishedArtifact },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub file: PathBuf,
    pub status: PublishStatus,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn publish(&self, file: &Path) -> Result<PublishedArtifact, PipelineError>;
}

/// Supabase-storage backed store: authenticated POST of raw bytes to a
/// per-bucket object endpoint, public URL derived from endpoint, bucket and
/// key.
pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    bucket: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key: api_key.into(),
        }
    }

    fn storage_key_for(file: &Path) -> String {
        let extension = file
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        format!("{}{}", Uuid::new_v4().simple(), extension)
    }
}

#[async_trait]
impl ArtifactStore for SupabaseStore {
    async fn publish(&self, file: &Path) -> Result<PublishedArtifact, PipelineError> {
        let bytes = tokio::fs::read(file).await.map_err(|e| {
            PipelineError::PublishError(format!("Could not read {}: {}", file.display(), e))
        })?;

        let key = Self::storage_key_for(file);
        let mime_type = mime_guess::from_path(file).first_or_octet_stream();
        let upload_url = format!("{}/storage/v1/object/{}/{}", self.endpoint, self.bucket, key);

        let response = self
            .client
            .post(&upload_url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", mime_type.essence_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| PipelineError::PublishError(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::PublishError(format!(
                "Upload failed with status {}: {}",
                status, body
            )));
        }

        let public_url = format!(
            "{}/storage/v1/object/public/{}/{}",
            self.endpoint, self.bucket, key
        );

        Ok(PublishedArtifact {
            local_path: file.to_path_buf(),
            key,
            public_url,
        })
    }
}

/// Uploads every file in `files`, best-effort; failures are recorded per
/// file, never propagated.
pub async fn publish_all(store: &dyn ArtifactStore, files: &[PathBuf]) -> Vec<PublishOutcome> {
    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let status = match store.publish(file).await {
            Ok(artifact) => {
                log::info!("Published {} as {}", file.display(), artifact.public_url);
                PublishStatus::Uploaded { artifact }
            }
            Err(e) => {
                log::warn!("Failed to publish {}: {}", file.display(), e);
                PublishStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        outcomes.push(PublishOutcome {
            file: file.clone(),
            status,
        });
    }
    outcomes
}
