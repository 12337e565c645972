use std::sync::Arc;
use tracing::{error, info};
use crate::core::{CommitError, DataApi, DraftRecord, PreconditionError, WizardError};
use crate::records::{ClassRecord, NewClass, Repository};

/// Turns a reviewed draft into a persisted class.
#[derive(Clone)]
pub struct ReviewStage {
    classes: Repository<ClassRecord>,
}

impl ReviewStage {
    pub fn new(api: Arc<dyn DataApi>) -> Self {
        Self {
            classes: Repository::new(api),
        }
    }

    /// Builds the create input, or the precondition the draft is missing.
    pub fn new_class(course_id: &str, draft: &DraftRecord) -> Result<NewClass, PreconditionError> {
        let thumbnail = draft.thumbnail.as_ref().ok_or(PreconditionError::MissingThumbnail)?;
        let video = draft.video.as_ref().ok_or(PreconditionError::MissingVideo)?;

        Ok(NewClass {
            course_id: course_id.to_string(),
            name: draft.title.clone(),
            description: draft.description.clone(),
            url: video.public_url.clone(),
            author: draft.author.clone(),
            image: thumbnail.public_url.clone(),
            transcript: draft.transcript.clone(),
            subtitle: draft.subtitle_url.clone(),
            class_flag: 0,
        })
    }

    /// Issues exactly one create call when the draft is complete, none otherwise.
    pub async fn commit(&self, course_id: &str, draft: &DraftRecord) -> Result<ClassRecord, WizardError> {
        let input = Self::new_class(course_id, draft)?;

        match self.classes.create(&input).await {
            Ok(record) => {
                info!(class_id = %record.id, %course_id, "Class saved");
                Ok(record)
            }
            Err(err) => {
                error!(%course_id, error = %err, "Failed to save class");
                Err(CommitError::from(err).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AssetReference, RecordKind};
    use crate::records::MemoryDataApi;

    fn reference(key: &str) -> AssetReference {
        AssetReference {
            name: key.rsplit('/').next().unwrap().to_string(),
            key: key.to_string(),
            raw_url: format!("https://amplify-s3-ryz.s3.us-east-1.amazonaws.com/{}", key),
            public_url: format!("https://d28jhwy9xe688b.cloudfront.net/{}", key),
        }
    }

    fn complete_draft() -> DraftRecord {
        DraftRecord {
            title: "Ownership".into(),
            author: "Ferris".into(),
            description: "Borrowing basics".into(),
            transcript: "Hello".into(),
            video: Some(reference("video-origin/demo.mp4")),
            thumbnail: Some(reference("Image/cover.png")),
            subtitle_url: None,
        }
    }

    #[tokio::test]
    async fn test_commit_creates_class() {
        let api = Arc::new(MemoryDataApi::new());
        let stage = ReviewStage::new(api.clone());

        let record = stage.commit("course-1", &complete_draft()).await.unwrap();

        assert_eq!(record.course_id, "course-1");
        assert_eq!(record.name, "Ownership");
        assert_eq!(record.url.as_deref(), Some("https://d28jhwy9xe688b.cloudfront.net/video-origin/demo.mp4"));
        assert_eq!(record.image.as_deref(), Some("https://d28jhwy9xe688b.cloudfront.net/Image/cover.png"));
        assert_eq!(record.class_flag, 0);
        assert_eq!(api.all(RecordKind::Class).await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_thumbnail_issues_no_create() {
        let api = Arc::new(MemoryDataApi::new());
        let stage = ReviewStage::new(api.clone());
        let draft = DraftRecord { thumbnail: None, ..complete_draft() };

        let err = stage.commit("course-1", &draft).await.unwrap_err();

        assert!(matches!(err, WizardError::Precondition(PreconditionError::MissingThumbnail)));
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_create_surfaces() {
        let api = Arc::new(MemoryDataApi::new());
        api.set_fail_writes(true);
        let stage = ReviewStage::new(api.clone());

        let err = stage.commit("course-1", &complete_draft()).await.unwrap_err();

        assert!(matches!(err, WizardError::Commit(CommitError::Api(_))));
        assert_eq!(api.create_calls(), 1);
    }
}
