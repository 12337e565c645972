use std::sync::Arc;
use tracing::{info, warn};
use crate::core::{AssetReference, JobHandle, JobSubmission, LaunchError, WorkflowEngine};

/// Object names the workflow writes its results under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNames {
    pub transcription_key: String,
    pub summary_key: String,
}

impl DerivedNames {
    pub fn for_asset(name: &str) -> Self {
        let base = base_name(name);
        Self {
            transcription_key: format!("{}_transcription", base),
            summary_key: format!("{}_summarize.txt", base),
        }
    }
}

/// `name` without its final extension.
pub fn base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    }
}

/// Submits processing jobs for uploaded videos.
#[derive(Clone)]
pub struct ProcessingLauncher {
    engine: Arc<dyn WorkflowEngine>,
    bucket: String,
    languages: Vec<String>,
}

impl ProcessingLauncher {
    pub fn new(engine: Arc<dyn WorkflowEngine>, bucket: impl Into<String>, languages: Vec<String>) -> Self {
        Self {
            engine,
            bucket: bucket.into(),
            languages,
        }
    }

    pub fn submission(&self, asset: &AssetReference, names: &DerivedNames) -> JobSubmission {
        JobSubmission {
            video_key: asset.name.clone(),
            bucket_name: self.bucket.clone(),
            transcription_key: names.transcription_key.clone(),
            summarized_text_file_key: names.summary_key.clone(),
            languages: self.languages.clone(),
        }
    }

    /// Sends exactly one submission; errors are returned as they come.
    pub async fn launch(&self, asset: &AssetReference, names: &DerivedNames) -> Result<JobHandle, LaunchError> {
        let submission = self.submission(asset, names);

        match self.engine.submit(&submission).await {
            Ok(handle) => {
                info!(video = %asset.key, job = %handle, "Processing job started");
                Ok(handle)
            }
            Err(err) => {
                warn!(video = %asset.key, error = %err, "Processing job rejected");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use crate::core::{PollError, StatusReport};

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("demo.mp4"), "demo");
        assert_eq!(base_name("lecture.part1.mov"), "lecture.part1");
        assert_eq!(base_name("noext"), "noext");
        assert_eq!(base_name("trailing."), "trailing.");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(
            DerivedNames::for_asset("demo.mp4"),
            DerivedNames {
                transcription_key: "demo_transcription".into(),
                summary_key: "demo_summarize.txt".into(),
            }
        );
    }

    #[derive(Default)]
    struct RecordingEngine {
        submissions: Mutex<Vec<JobSubmission>>,
        reject: bool,
    }

    #[async_trait]
    impl WorkflowEngine for RecordingEngine {
        async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, LaunchError> {
            self.submissions.lock().unwrap().push(submission.clone());
            if self.reject {
                return Err(LaunchError::Rejected("quota exceeded".into()));
            }
            Ok(JobHandle("arn:exec:1".into()))
        }

        async fn status(&self, _handle: &JobHandle) -> Result<StatusReport, PollError> {
            unreachable!("launcher never polls")
        }
    }

    fn reference() -> AssetReference {
        AssetReference {
            name: "demo.mp4".into(),
            key: "video-origin/demo.mp4".into(),
            raw_url: "https://amplify-s3-ryz.s3.us-east-1.amazonaws.com/video-origin/demo.mp4".into(),
            public_url: "https://cdn.example.com/video-origin/demo.mp4".into(),
        }
    }

    #[tokio::test]
    async fn test_launch_sends_one_submission() {
        let engine = Arc::new(RecordingEngine::default());
        let launcher = ProcessingLauncher::new(engine.clone(), "amplify-s3-ryz", vec!["english".into()]);

        let handle = launcher
            .launch(&reference(), &DerivedNames::for_asset("demo.mp4"))
            .await
            .unwrap();

        assert_eq!(handle.as_str(), "arn:exec:1");
        let submissions = engine.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].video_key, "demo.mp4");
        assert_eq!(submissions[0].bucket_name, "amplify-s3-ryz");
        assert_eq!(submissions[0].summarized_text_file_key, "demo_summarize.txt");
        assert_eq!(submissions[0].languages, vec!["english".to_string()]);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let engine = Arc::new(RecordingEngine { reject: true, ..Default::default() });
        let launcher = ProcessingLauncher::new(engine.clone(), "amplify-s3-ryz", vec!["english".into()]);

        let err = launcher
            .launch(&reference(), &DerivedNames::for_asset("demo.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Rejected(_)));
        assert_eq!(engine.submissions.lock().unwrap().len(), 1);
    }
}
