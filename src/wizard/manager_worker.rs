use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::core::{
    Asset, AssetKind, AssetReference, DraftEdit, DraftRecord, FailureReason, JobHandle, JobStatus,
    PollError, PreconditionError, ProcessingJob, ProcessingState, Result, SessionId, WizardEvent,
    WizardSnapshot, WizardStep,
};
use crate::records::ClassRecord;
use super::launcher::{DerivedNames, ProcessingLauncher};
use super::manager::{WizardCommand, WizardOptions, WizardServices};
use super::poller::{PollEvent, PollHandle, PollMessage, StatusPoller};
use super::review::ReviewStage;
use super::upload::UploadCoordinator;

pub(crate) struct WizardWorker {
    session_id: SessionId,
    course_id: String,
    author: String,

    uploader: UploadCoordinator,
    launcher: ProcessingLauncher,
    poller: StatusPoller,
    review: ReviewStage,

    step: WizardStep,
    processing: ProcessingState,
    processing_progress: u8,
    upload_progress: u8,
    job: Option<ProcessingJob>,
    draft: DraftRecord,

    /// Bumped whenever a poll starts or is abandoned; events from older polls are dropped
    generation: u64,
    active_poll: Option<PollHandle>,

    event_tx: broadcast::Sender<WizardEvent>,
    poll_tx: mpsc::UnboundedSender<PollEvent>,
}

impl WizardWorker {
    fn new(
        session_id: SessionId,
        course_id: String,
        author: String,
        services: WizardServices,
        options: WizardOptions,
        event_tx: broadcast::Sender<WizardEvent>,
        poll_tx: mpsc::UnboundedSender<PollEvent>,
    ) -> Self {
        let uploader = UploadCoordinator::new(services.store.clone(), options.public_prefix);
        let launcher = ProcessingLauncher::new(services.engine.clone(), uploader.bucket(), options.languages);
        let poller = StatusPoller::new(services.engine, options.poller);
        let review = ReviewStage::new(services.data);

        Self {
            session_id,
            draft: DraftRecord::new(author.clone()),
            course_id,
            author,
            uploader,
            launcher,
            poller,
            review,
            step: WizardStep::Upload,
            processing: ProcessingState::Idle,
            processing_progress: 0,
            upload_progress: 0,
            job: None,
            generation: 0,
            active_poll: None,
            event_tx,
            poll_tx,
        }
    }

    pub(crate) async fn run(
        session_id: SessionId,
        course_id: String,
        author: String,
        services: WizardServices,
        options: WizardOptions,
        mut command_rx: mpsc::Receiver<WizardCommand>,
        event_tx: broadcast::Sender<WizardEvent>,
        shutdown: CancellationToken,
    ) {
        let (poll_tx, mut poll_rx) = mpsc::unbounded_channel();
        let mut worker = Self::new(session_id, course_id, author, services, options, event_tx, poll_tx);
        info!(session = %worker.session_id, course = %worker.course_id, "Wizard session opened");

        // Main event loop; shutdown wins over queued work
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                command = command_rx.recv() => match command {
                    Some(command) => worker.handle_command(command).await,
                    None => break,
                },
                Some(event) = poll_rx.recv() => {
                    worker.handle_poll_event(event);
                }
            }
        }

        worker.abandon_processing();
        info!(session = %worker.session_id, "Wizard session closed");
    }

    async fn handle_command(&mut self, command: WizardCommand) {
        match command {
            WizardCommand::UploadVideo { asset, reply } => {
                let result = self.upload_video(asset).await;
                let _ = reply.send(result);
            }
            WizardCommand::StartProcessing { reply } => {
                let result = self.start_processing().await;
                let _ = reply.send(result);
            }
            WizardCommand::SkipProcessing { reply } => {
                let _ = reply.send(self.skip_processing());
            }
            WizardCommand::Advance { reply } => {
                let _ = reply.send(self.advance());
            }
            WizardCommand::GoBack { step, reply } => {
                let _ = reply.send(self.go_back(step));
            }
            WizardCommand::EditDraft { edit, reply } => {
                let _ = reply.send(self.edit_draft(edit));
            }
            WizardCommand::UploadThumbnail { asset, reply } => {
                let result = self.upload_thumbnail(asset).await;
                let _ = reply.send(result);
            }
            WizardCommand::Commit { reply } => {
                let result = self.commit().await;
                let _ = reply.send(result);
            }
            WizardCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn require_step(&self, expected: WizardStep) -> Result<()> {
        if self.step != expected {
            return Err(PreconditionError::WrongStep {
                expected,
                actual: self.step,
            }
            .into());
        }
        Ok(())
    }

    async fn upload(&self, kind: AssetKind, asset: &Asset) -> Result<AssetReference> {
        let event_tx = self.event_tx.clone();
        let reference = self
            .uploader
            .upload(kind, asset, move |progress| {
                let _ = event_tx.send(WizardEvent::UploadProgress(progress));
            })
            .await?;
        Ok(reference)
    }

    async fn upload_video(&mut self, asset: Asset) -> Result<AssetReference> {
        self.require_step(WizardStep::Upload)?;

        self.upload_progress = 0;
        let reference = self.upload(AssetKind::Video, &asset).await?;

        self.upload_progress = 100;
        if self.processing != ProcessingState::Idle {
            // A new video invalidates whatever the previous job produced
            self.abandon_processing();
        }
        self.draft.video = Some(reference.clone());
        self.set_step(WizardStep::Processing);
        Ok(reference)
    }

    async fn start_processing(&mut self) -> Result<JobHandle> {
        self.require_step(WizardStep::Processing)?;
        if self.processing != ProcessingState::Idle {
            return Err(PreconditionError::ProcessingBusy.into());
        }
        let video = self.draft.video.clone().ok_or(PreconditionError::MissingVideo)?;

        self.generation += 1;
        self.processing_progress = 0;
        self.set_processing(ProcessingState::Running);

        let names = DerivedNames::for_asset(&video.name);
        let handle = match self.launcher.launch(&video, &names).await {
            Ok(handle) => handle,
            Err(err) => {
                self.set_processing(ProcessingState::Failed(FailureReason::Launch(err.to_string())));
                return Err(err.into());
            }
        };

        self.job = Some(ProcessingJob::new(handle.clone()));
        self.active_poll = Some(self.poller.spawn(handle.clone(), self.generation, self.poll_tx.clone()));
        Ok(handle)
    }

    fn skip_processing(&mut self) -> Result<()> {
        self.require_step(WizardStep::Processing)?;
        match self.processing {
            ProcessingState::Idle | ProcessingState::Failed(_) => {
                self.set_processing(ProcessingState::Skipped);
                Ok(())
            }
            _ => Err(PreconditionError::ProcessingBusy.into()),
        }
    }

    fn advance(&mut self) -> Result<WizardStep> {
        let next = match self.step {
            WizardStep::Upload if self.draft.video.is_some() => WizardStep::Processing,
            WizardStep::Upload => return Err(PreconditionError::MissingVideo.into()),
            WizardStep::Processing if self.processing.allows_review() => WizardStep::Review,
            WizardStep::Processing => return Err(PreconditionError::ProcessingIncomplete.into()),
            WizardStep::Review => {
                return Err(PreconditionError::InvalidNavigation {
                    from: WizardStep::Review,
                    to: WizardStep::Review,
                }
                .into());
            }
        };

        self.set_step(next);
        Ok(next)
    }

    fn go_back(&mut self, step: WizardStep) -> Result<()> {
        if step >= self.step {
            return Err(PreconditionError::InvalidNavigation { from: self.step, to: step }.into());
        }

        let unfinished = matches!(self.processing, ProcessingState::Running | ProcessingState::Failed(_));
        if step <= WizardStep::Processing && unfinished {
            self.abandon_processing();
        }
        self.set_step(step);
        Ok(())
    }

    fn edit_draft(&mut self, edit: DraftEdit) -> Result<()> {
        debug!(?edit, "Draft edited");
        self.draft.apply_edit(edit);
        Ok(())
    }

    async fn upload_thumbnail(&mut self, asset: Asset) -> Result<AssetReference> {
        let reference = self.upload(AssetKind::Thumbnail, &asset).await?;
        self.draft.thumbnail = Some(reference.clone());
        Ok(reference)
    }

    async fn commit(&mut self) -> Result<ClassRecord> {
        self.require_step(WizardStep::Review)?;

        let record = self.review.commit(&self.course_id, &self.draft).await?;
        let _ = self.event_tx.send(WizardEvent::Completed { record: record.clone() });
        self.reset();
        Ok(record)
    }

    fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            session_id: self.session_id,
            course_id: self.course_id.clone(),
            step: self.step,
            processing: self.processing.clone(),
            processing_progress: self.processing_progress,
            upload_progress: self.upload_progress,
            job: self.job.clone(),
            draft: self.draft.clone(),
        }
    }

    fn handle_poll_event(&mut self, event: PollEvent) {
        if event.generation != self.generation || self.processing != ProcessingState::Running {
            debug!(generation = event.generation, current = self.generation, "Dropping stale poll event");
            return;
        }

        match event.message {
            PollMessage::Progress(percentage) => {
                if percentage > self.processing_progress {
                    self.set_processing_progress(percentage);
                }
            }
            PollMessage::Status(status) => {
                if let Some(job) = self.job.as_mut() {
                    job.advance(status, None);
                }
            }
            PollMessage::Finished { status, outcome } => {
                self.active_poll = None;
                match outcome {
                    Ok(output) => {
                        if let Some(job) = self.job.as_mut() {
                            job.advance(JobStatus::Succeeded, Some(output.clone()));
                        }
                        self.draft.apply_output(&output);
                        self.set_processing_progress(100);
                        self.set_processing(ProcessingState::Completed);
                    }
                    Err(err) => {
                        if let Some(job) = self.job.as_mut() {
                            job.advance(status, None);
                        }
                        warn!(error = %err, "Processing failed");
                        self.set_processing(ProcessingState::Failed(failure_reason(err)));
                    }
                }
            }
        }
    }

    /// Cancels any running poll and forgets the job, along with the draft
    /// fields its output filled.
    fn abandon_processing(&mut self) {
        if let Some(poll) = self.active_poll.take() {
            info!(job = %poll.job(), "Polling cancelled");
            poll.cancel();
        }
        self.generation += 1;
        if let Some(job) = self.job.take() {
            if job.output.is_some() {
                self.draft.clear_output();
            }
        }
        self.processing_progress = 0;
        if self.processing != ProcessingState::Idle {
            self.set_processing(ProcessingState::Idle);
        }
    }

    fn reset(&mut self) {
        self.abandon_processing();
        self.upload_progress = 0;
        self.draft = DraftRecord::new(self.author.clone());
        self.set_step(WizardStep::Upload);
    }

    fn set_step(&mut self, step: WizardStep) {
        if self.step == step {
            return;
        }
        let from = std::mem::replace(&mut self.step, step);
        debug!(?from, to = ?step, "Step changed");
        let _ = self.event_tx.send(WizardEvent::StepChanged { from, to: step });
    }

    fn set_processing(&mut self, state: ProcessingState) {
        let old_state = std::mem::replace(&mut self.processing, state.clone());
        let _ = self.event_tx.send(WizardEvent::ProcessingStateChanged {
            old_state,
            new_state: state,
        });
    }

    fn set_processing_progress(&mut self, percentage: u8) {
        self.processing_progress = percentage;
        if let Some(job) = &self.job {
            let _ = self.event_tx.send(WizardEvent::ProcessingProgress {
                job: job.handle.clone(),
                percentage,
            });
        }
    }
}

fn failure_reason(err: PollError) -> FailureReason {
    match err {
        PollError::Terminal(status) => FailureReason::Terminal(status),
        PollError::MalformedOutput(message) => FailureReason::MalformedOutput(message),
        other => FailureReason::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use async_trait::async_trait;
    use crate::core::{
        JobOutput, JobSubmission, LaunchError, ObjectStore, ProgressFn, StatusReport, StoredObject,
        UploadError, WizardError, WorkflowEngine,
    };
    use crate::records::MemoryDataApi;

    struct NullStore;

    #[async_trait]
    impl ObjectStore for NullStore {
        async fn put(&self, key: &str, asset: &Asset, on_progress: ProgressFn) -> std::result::Result<StoredObject, UploadError> {
            on_progress(asset.len(), asset.len());
            Ok(StoredObject {
                url: format!("https://amplify-s3-ryz.s3.us-east-1.amazonaws.com/{}", key),
            })
        }

        fn bucket(&self) -> &str {
            "amplify-s3-ryz"
        }
    }

    struct RunningEngine;

    #[async_trait]
    impl WorkflowEngine for RunningEngine {
        async fn submit(&self, _submission: &JobSubmission) -> std::result::Result<JobHandle, LaunchError> {
            Ok(JobHandle("arn:exec:1".into()))
        }

        async fn status(&self, _handle: &JobHandle) -> std::result::Result<StatusReport, PollError> {
            Ok(StatusReport {
                status: JobStatus::Running,
                output: None,
            })
        }
    }

    fn worker() -> (WizardWorker, broadcast::Receiver<WizardEvent>) {
        let services = WizardServices {
            store: Arc::new(NullStore),
            engine: Arc::new(RunningEngine),
            data: Arc::new(MemoryDataApi::new()),
        };
        let (event_tx, event_rx) = broadcast::channel(64);
        let (poll_tx, _) = mpsc::unbounded_channel();
        let worker = WizardWorker::new(
            SessionId::new(),
            "course-1".into(),
            "Ferris".into(),
            services,
            WizardOptions::default(),
            event_tx,
            poll_tx,
        );
        (worker, event_rx)
    }

    /// Puts the worker in the processing step with a running job at `generation`.
    fn running(worker: &mut WizardWorker, generation: u64) {
        worker.step = WizardStep::Processing;
        worker.processing = ProcessingState::Running;
        worker.generation = generation;
        worker.job = Some(ProcessingJob::new(JobHandle(format!("arn:exec:{}", generation))));
    }

    fn output(title: &str) -> JobOutput {
        JobOutput {
            title: title.into(),
            description: "d".into(),
            transcript: "t".into(),
            subtitle: None,
        }
    }

    fn finished(generation: u64, title: &str) -> PollEvent {
        PollEvent {
            generation,
            message: PollMessage::Finished {
                status: JobStatus::Succeeded,
                outcome: Ok(output(title)),
            },
        }
    }

    #[tokio::test]
    async fn test_stale_success_is_ignored() {
        let (mut worker, _events) = worker();
        running(&mut worker, 2);

        worker.handle_poll_event(finished(1, "Old job"));

        assert_eq!(worker.processing, ProcessingState::Running);
        assert_eq!(worker.draft.title, "");
        assert_eq!(worker.job.as_ref().unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_success_fills_draft() {
        let (mut worker, _events) = worker();
        running(&mut worker, 1);

        worker.handle_poll_event(PollEvent { generation: 1, message: PollMessage::Progress(40) });
        worker.handle_poll_event(finished(1, "Ownership"));

        assert_eq!(worker.processing, ProcessingState::Completed);
        assert_eq!(worker.processing_progress, 100);
        assert_eq!(worker.draft.title, "Ownership");
        let job = worker.job.as_ref().unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.output.as_ref().unwrap().title, "Ownership");
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let (mut worker, _events) = worker();
        running(&mut worker, 1);

        for percentage in [10, 30, 20, 95, 50] {
            worker.handle_poll_event(PollEvent { generation: 1, message: PollMessage::Progress(percentage) });
        }

        assert_eq!(worker.processing_progress, 95);
    }

    #[tokio::test]
    async fn test_failure_is_surfaced_once() {
        let (mut worker, mut events) = worker();
        running(&mut worker, 1);

        let failure = |status| PollEvent {
            generation: 1,
            message: PollMessage::Finished {
                status,
                outcome: Err(PollError::Terminal(status)),
            },
        };
        worker.handle_poll_event(failure(JobStatus::Aborted));
        worker.handle_poll_event(failure(JobStatus::Aborted));

        assert_eq!(
            worker.processing,
            ProcessingState::Failed(FailureReason::Terminal(JobStatus::Aborted))
        );
        let mut changes = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, WizardEvent::ProcessingStateChanged { .. }) {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
        assert!(!worker.processing.allows_review());
    }

    #[tokio::test]
    async fn test_malformed_output_keeps_draft() {
        let (mut worker, _events) = worker();
        running(&mut worker, 1);

        worker.handle_poll_event(PollEvent {
            generation: 1,
            message: PollMessage::Finished {
                status: JobStatus::Succeeded,
                outcome: Err(PollError::MalformedOutput("expected a JSON object".into())),
            },
        });

        assert!(matches!(
            worker.processing,
            ProcessingState::Failed(FailureReason::MalformedOutput(_))
        ));
        assert_eq!(worker.draft.title, "");
        assert_eq!(worker.job.as_ref().unwrap().output, None);
    }

    #[tokio::test]
    async fn test_go_back_abandons_job() {
        let (mut worker, _events) = worker();
        running(&mut worker, 3);

        worker.go_back(WizardStep::Upload).unwrap();
        worker.handle_poll_event(finished(3, "Too late"));

        assert_eq!(worker.step, WizardStep::Upload);
        assert_eq!(worker.processing, ProcessingState::Idle);
        assert!(worker.job.is_none());
        assert_eq!(worker.draft.title, "");
    }

    #[tokio::test]
    async fn test_review_round_trip_keeps_finished_job() {
        let (mut worker, _events) = worker();
        running(&mut worker, 1);
        worker.handle_poll_event(finished(1, "Ownership"));
        assert_eq!(worker.advance().unwrap(), WizardStep::Review);

        worker.go_back(WizardStep::Processing).unwrap();

        assert_eq!(worker.processing, ProcessingState::Completed);
        assert_eq!(worker.draft.title, "Ownership");
        assert!(worker.job.as_ref().unwrap().output.is_some());
        assert_eq!(worker.advance().unwrap(), WizardStep::Review);
        assert_eq!(worker.draft.title, "Ownership");
    }

    #[tokio::test]
    async fn test_go_back_clears_failed_job() {
        let (mut worker, _events) = worker();
        running(&mut worker, 1);
        worker.handle_poll_event(PollEvent {
            generation: 1,
            message: PollMessage::Finished {
                status: JobStatus::Failed,
                outcome: Err(PollError::Terminal(JobStatus::Failed)),
            },
        });

        worker.go_back(WizardStep::Upload).unwrap();

        assert_eq!(worker.processing, ProcessingState::Idle);
        assert!(worker.job.is_none());
    }

    #[tokio::test]
    async fn test_new_video_discards_previous_output() {
        let (mut worker, _events) = worker();
        running(&mut worker, 1);
        worker.handle_poll_event(finished(1, "Ownership"));
        worker.go_back(WizardStep::Upload).unwrap();
        assert_eq!(worker.processing, ProcessingState::Completed);

        worker.upload_video(Asset::from_bytes("other.mp4", vec![1u8; 8])).await.unwrap();

        assert_eq!(worker.step, WizardStep::Processing);
        assert_eq!(worker.processing, ProcessingState::Idle);
        assert!(worker.job.is_none());
        assert_eq!(worker.draft.title, "");
        assert_eq!(worker.draft.transcript, "");
        assert_eq!(worker.draft.video.as_ref().unwrap().name, "other.mp4");
        assert!(matches!(
            worker.advance(),
            Err(WizardError::Precondition(PreconditionError::ProcessingIncomplete))
        ));
    }

    #[tokio::test]
    async fn test_navigation_rules() {
        let (mut worker, _events) = worker();

        assert!(matches!(
            worker.advance(),
            Err(WizardError::Precondition(PreconditionError::MissingVideo))
        ));
        assert!(matches!(
            worker.go_back(WizardStep::Upload),
            Err(WizardError::Precondition(PreconditionError::InvalidNavigation { .. }))
        ));

        worker.upload_video(Asset::from_bytes("demo.mp4", vec![1u8; 8])).await.unwrap();
        assert_eq!(worker.step, WizardStep::Processing);
        assert!(matches!(
            worker.advance(),
            Err(WizardError::Precondition(PreconditionError::ProcessingIncomplete))
        ));

        worker.skip_processing().unwrap();
        assert_eq!(worker.advance().unwrap(), WizardStep::Review);
        assert!(matches!(
            worker.commit().await,
            Err(WizardError::Precondition(PreconditionError::MissingThumbnail))
        ));
    }
}
