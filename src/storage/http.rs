use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;
use crate::config::StorageConfig;
use crate::core::{Asset, AssetSource, ObjectStore, ProgressFn, StoredObject, UploadError};
use super::keys::raw_object_url;
use super::progress_stream::ProgressStream;

/// Object store reached through plain HTTP `PUT` requests.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    region: String,
    chunk_size: usize,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            chunk_size: config.chunk_size.max(1),
            token: config.token.clone(),
        })
    }

    async fn body_for(&self, asset: &Asset, on_progress: ProgressFn) -> Result<Body, UploadError> {
        let total = asset.len();

        let body = match &asset.source {
            AssetSource::Bytes(bytes) => {
                let stream = stream::iter(split_chunks(bytes, self.chunk_size));
                Body::wrap_stream(ProgressStream::new(stream, total, on_progress))
            }
            AssetSource::File { path, .. } => {
                let file = File::open(path).await?;
                let stream = ReaderStream::with_capacity(file, self.chunk_size);
                Body::wrap_stream(ProgressStream::new(stream, total, on_progress))
            }
        };

        Ok(body)
    }
}

fn split_chunks(bytes: &Bytes, chunk_size: usize) -> Vec<std::io::Result<Bytes>> {
    (0..bytes.len())
        .step_by(chunk_size)
        .map(|start| Ok(bytes.slice(start..(start + chunk_size).min(bytes.len()))))
        .collect()
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, asset: &Asset, on_progress: ProgressFn) -> Result<StoredObject, UploadError> {
        let body = self.body_for(asset, on_progress).await?;
        let url = format!("{}/{}", self.endpoint, key);
        debug!(%url, bytes = asset.len(), "Uploading object");

        let mut request = self.client
            .put(&url)
            .header(CONTENT_LENGTH, asset.len())
            .body(body);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::storage(
                status.as_u16(),
                format!("Upload of '{}' failed: {}", key, message),
            ));
        }

        Ok(StoredObject {
            url: raw_object_url(&self.bucket, &self.region, key),
        })
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
