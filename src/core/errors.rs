use thiserror::Error;
use super::types::{JobStatus, RecordKind, WizardStep};

/// Errors raised by the GraphQL transport shared by the workflow engine and the data API.
#[derive(Error, Debug)]
pub enum GraphQlError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: status code {status_code}, message: {message}")]
    Status {
        status_code: u16,
        message: String,
    },

    #[error("GraphQL errors: {}", .0.join("; "))]
    Errors(Vec<String>),

    #[error("Response carried no data for '{0}'")]
    EmptyData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Asset '{0}' is empty")]
    EmptyAsset(String),

    #[error("Invalid asset name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: status code {status_code}, message: {message}")]
    Storage {
        status_code: u16,
        message: String,
    },
}

impl UploadError {
    pub fn storage(status_code: u16, message: impl Into<String>) -> Self {
        Self::Storage {
            status_code,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Submission returned no job handle")]
    MissingHandle,

    #[error("Transport error: {0}")]
    Transport(#[from] GraphQlError),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status query failed: {0}")]
    Query(#[from] GraphQlError),

    #[error("Job finished with status {0}")]
    Terminal(JobStatus),

    #[error("Job output is malformed: {0}")]
    MalformedOutput(String),

    #[error("Unknown job status '{0}'")]
    UnknownStatus(String),
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("{kind} '{id}' not found")]
    NotFound {
        kind: RecordKind,
        id: String,
    },

    #[error("Failed to decode {kind} record: {source}")]
    Decode {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] GraphQlError),
}

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Failed to persist class: {0}")]
    Api(#[from] DataError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Please select and upload a thumbnail image before saving")]
    MissingThumbnail,

    #[error("No video has been uploaded")]
    MissingVideo,

    #[error("Operation requires step {expected:?}, wizard is at {actual:?}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },

    #[error("Cannot move from {from:?} to {to:?}")]
    InvalidNavigation {
        from: WizardStep,
        to: WizardStep,
    },

    #[error("Processing already started")]
    ProcessingBusy,

    #[error("Processing has not finished")]
    ProcessingIncomplete,
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("Processing failed: {0}")]
    Poll(#[from] PollError),

    #[error("Commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    #[error("Wizard session closed")]
    SessionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WizardError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Error alias
pub type Result<T, E = WizardError> = std::result::Result<T, E>;
