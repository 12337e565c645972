mod errors;
mod traits;
mod types;

pub use errors::{
    CommitError, DataError, GraphQlError, LaunchError, PollError, PreconditionError, Result,
    UploadError, WizardError,
};
pub use traits::{DataApi, ObjectStore, ProgressFn, StoredObject, WorkflowEngine};
pub use types::{
    Asset, AssetKind, AssetReference, AssetSource, DraftEdit, DraftRecord, FailureReason, JobHandle,
    JobOutput, JobStatus, JobSubmission, ProcessingJob, ProcessingState, RecordKind, SessionId,
    StatusReport, UploadProgress, UploadTask, WizardEvent, WizardSnapshot, WizardStep,
};
pub(crate) use types::percentage;
