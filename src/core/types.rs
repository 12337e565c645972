use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::records::ClassRecord;

/// Wizard session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the bytes of an asset come from.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Bytes(Bytes),
    File {
        path: PathBuf,
        size: u64,
    },
}

/// A binary asset selected by the user.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub source: AssetSource,
}

impl Asset {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: AssetSource::Bytes(bytes.into()),
        }
    }

    /// Builds an asset backed by a file on disk; the name is the file name.
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path).await?.len();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Invalid file name: {:?}", path))
            })?
            .to_string();

        Ok(Self {
            name,
            source: AssetSource::File {
                path: path.to_path_buf(),
                size,
            },
        })
    }

    pub fn len(&self) -> u64 {
        match &self.source {
            AssetSource::Bytes(bytes) => bytes.len() as u64,
            AssetSource::File { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What an uploaded asset is used for; decides its key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AssetKind {
    Video,
    Thumbnail,
}

impl AssetKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            AssetKind::Video => "video-origin",
            AssetKind::Thumbnail => "Image",
        }
    }
}

/// In-flight upload bookkeeping, dropped once the durable URL is known.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub kind: AssetKind,
    pub asset: Asset,
    pub destination_key: String,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

impl UploadTask {
    pub fn percentage(&self) -> u8 {
        percentage(self.transferred_bytes, self.total_bytes)
    }
}

pub(crate) fn percentage(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = transferred.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

/// Durable reference to an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    /// Original asset name, e.g. `demo.mp4`
    pub name: String,
    /// Object key, e.g. `video-origin/demo.mp4`
    pub key: String,
    /// URL reported by the storage endpoint
    pub raw_url: String,
    /// `raw_url` rewritten under the canonical public prefix
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub kind: AssetKind,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub percentage: u8,
}

/// Opaque identifier of a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::TimedOut => "TIMED_OUT",
            JobStatus::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = crate::core::PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            "TIMED_OUT" => Ok(JobStatus::TimedOut),
            "ABORTED" => Ok(JobStatus::Aborted),
            other => Err(crate::core::PollError::UnknownStatus(other.to_string())),
        }
    }
}

/// Payload sent to the workflow engine to start processing an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub video_key: String,
    pub bucket_name: String,
    pub transcription_key: String,
    pub summarized_text_file_key: String,
    pub languages: Vec<String>,
}

/// One answer of the workflow engine to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: JobStatus,
    /// Serialized output, only meaningful once the status is `SUCCEEDED`
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub title: String,
    pub description: String,
    pub transcript: String,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingJob {
    pub handle: JobHandle,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub output: Option<JobOutput>,
}

impl ProcessingJob {
    pub fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            status: JobStatus::Pending,
            started_at: Utc::now(),
            output: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records a new status. Terminal states are final, and output is only
    /// kept alongside `SUCCEEDED`. Returns false when the job was already terminal.
    pub fn advance(&mut self, status: JobStatus, output: Option<JobOutput>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        if status == JobStatus::Succeeded {
            self.output = output;
        }
        true
    }
}

/// Editable state of the class being created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftRecord {
    pub title: String,
    pub author: String,
    pub description: String,
    pub transcript: String,
    pub video: Option<AssetReference>,
    pub thumbnail: Option<AssetReference>,
    pub subtitle_url: Option<String>,
}

impl DraftRecord {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Default::default()
        }
    }

    pub fn apply_output(&mut self, output: &JobOutput) {
        self.title = output.title.clone();
        self.description = output.description.clone();
        self.transcript = output.transcript.clone();
        self.subtitle_url = output.subtitle.clone();
    }

    /// Empties the fields `apply_output` fills. Assets and author stay.
    pub fn clear_output(&mut self) {
        self.title.clear();
        self.description.clear();
        self.transcript.clear();
        self.subtitle_url = None;
    }

    pub fn apply_edit(&mut self, edit: DraftEdit) {
        match edit {
            DraftEdit::Title(value) => self.title = value,
            DraftEdit::Author(value) => self.author = value,
            DraftEdit::Description(value) => self.description = value,
            DraftEdit::Transcript(value) => self.transcript = value,
        }
    }
}

/// A change to one user-editable draft field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEdit {
    Title(String),
    Author(String),
    Description(String),
    Transcript(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum WizardStep {
    /// Upload the lesson video
    Upload,
    /// AI processing or manual entry
    Processing,
    /// Review and save
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Launch(String),
    Query(String),
    Terminal(JobStatus),
    MalformedOutput(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Launch(message) => write!(f, "launch failed: {}", message),
            FailureReason::Query(message) => write!(f, "status query failed: {}", message),
            FailureReason::Terminal(status) => write!(f, "job finished with status {}", status),
            FailureReason::MalformedOutput(message) => write!(f, "malformed output: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    /// Nothing chosen yet
    Idle,
    /// Manual entry instead of AI processing
    Skipped,
    Running,
    Completed,
    Failed(FailureReason),
}

impl ProcessingState {
    pub fn allows_review(&self) -> bool {
        matches!(self, ProcessingState::Skipped | ProcessingState::Completed)
    }
}

/// Point-in-time view of a wizard session.
#[derive(Debug, Clone)]
pub struct WizardSnapshot {
    pub session_id: SessionId,
    pub course_id: String,
    pub step: WizardStep,
    pub processing: ProcessingState,
    pub processing_progress: u8,
    pub upload_progress: u8,
    pub job: Option<ProcessingJob>,
    pub draft: DraftRecord,
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    StepChanged {
        from: WizardStep,
        to: WizardStep,
    },

    UploadProgress(UploadProgress),

    ProcessingProgress {
        job: JobHandle,
        percentage: u8,
    },

    ProcessingStateChanged {
        old_state: ProcessingState,
        new_state: ProcessingState,
    },

    /// The class was saved and the session reset
    Completed {
        record: ClassRecord,
    },
}

/// Record kinds exposed by the data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RecordKind {
    Course,
    Class,
    Comment,
    Reward,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Course => "Course",
            RecordKind::Class => "Class",
            RecordKind::Comment => "Comment",
            RecordKind::Reward => "Reward",
        }
    }

    /// Plural form used by generated list queries.
    pub fn plural(&self) -> &'static str {
        match self {
            RecordKind::Course => "Courses",
            RecordKind::Class => "Classes",
            RecordKind::Comment => "Comments",
            RecordKind::Reward => "Rewards",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Events and snapshots cross task boundaries
const _: fn() = || {
    fn assert_send<T: Send>() {}
    assert_send::<WizardEvent>();
    assert_send::<WizardSnapshot>();
    assert_send::<UploadTask>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        use JobStatus::*;

        assert!(!Pending.is_terminal());
        assert!(!Running.is_terminal());
        assert!(Succeeded.is_terminal());
        assert!(Failed.is_terminal());
        assert!(TimedOut.is_terminal());
        assert!(Aborted.is_terminal());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("TIMED_OUT".parse::<JobStatus>().unwrap(), JobStatus::TimedOut);
        assert_eq!("RUNNING".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let mut job = ProcessingJob::new(JobHandle("arn:1".into()));
        assert!(job.advance(JobStatus::Running, None));
        assert!(job.advance(JobStatus::Aborted, None));
        assert!(!job.advance(JobStatus::Succeeded, None));
        assert_eq!(job.status, JobStatus::Aborted);
    }

    #[test]
    fn test_output_only_kept_on_success() {
        let output = JobOutput {
            title: "t".into(),
            description: "d".into(),
            transcript: "x".into(),
            subtitle: None,
        };

        let mut failed = ProcessingJob::new(JobHandle("arn:1".into()));
        failed.advance(JobStatus::Failed, Some(output.clone()));
        assert!(failed.output.is_none());

        let mut succeeded = ProcessingJob::new(JobHandle("arn:2".into()));
        succeeded.advance(JobStatus::Succeeded, Some(output.clone()));
        assert_eq!(succeeded.output, Some(output));
    }

    #[test]
    fn test_clear_output_keeps_assets() {
        let output = JobOutput {
            title: "Ownership".into(),
            description: "d".into(),
            transcript: "x".into(),
            subtitle: Some("https://d28jhwy9xe688b.cloudfront.net/subtitles/demo.vtt".into()),
        };
        let video = AssetReference {
            name: "demo.mp4".into(),
            key: "video-origin/demo.mp4".into(),
            raw_url: "https://amplify-s3-ryz.s3.us-east-1.amazonaws.com/video-origin/demo.mp4".into(),
            public_url: "https://d28jhwy9xe688b.cloudfront.net/video-origin/demo.mp4".into(),
        };
        let mut draft = DraftRecord::new("Ferris");
        draft.video = Some(video.clone());
        draft.apply_output(&output);

        draft.clear_output();

        assert_eq!(draft.title, "");
        assert_eq!(draft.description, "");
        assert_eq!(draft.transcript, "");
        assert_eq!(draft.subtitle_url, None);
        assert_eq!(draft.author, "Ferris");
        assert_eq!(draft.video, Some(video));
    }

    #[test]
    fn test_percentage_is_clamped() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(50, 200), 25);
        assert_eq!(percentage(300, 200), 100);
    }

    #[test]
    fn test_session_id_generation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
        assert!(!id1.to_string().is_empty());
    }
}
