use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use crate::records::Filter;
use super::errors::{DataError, LaunchError, PollError, UploadError};
use super::types::{Asset, JobHandle, JobSubmission, RecordKind, StatusReport};

/// Progress callback: `(transferred_bytes, total_bytes)`
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Result of a durable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Raw URL of the object on the storage endpoint
    pub url: String,
}

/// Object storage - the two operations the wizard consumes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `asset` under `key`, reporting progress as bytes leave.
    async fn put(&self, key: &str, asset: &Asset, on_progress: ProgressFn) -> Result<StoredObject, UploadError>;

    /// Bucket the objects land in.
    fn bucket(&self) -> &str;
}

/// Workflow engine that runs transcription and summarization.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Starts one execution. Never retried.
    async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, LaunchError>;

    /// Queries the current status of an execution.
    async fn status(&self, handle: &JobHandle) -> Result<StatusReport, PollError>;
}

/// Generic record access over the data API, keyed by server-issued ids.
#[async_trait]
pub trait DataApi: Send + Sync {
    async fn create(&self, kind: RecordKind, input: Value) -> Result<Value, DataError>;

    async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, DataError>;

    async fn list(&self, kind: RecordKind, filter: &Filter) -> Result<Vec<Value>, DataError>;

    /// `patch` holds only the fields to change.
    async fn update(&self, kind: RecordKind, id: &str, patch: Value) -> Result<Value, DataError>;

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), DataError>;
}
