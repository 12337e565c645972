use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::config::{Config, PollerConfig};
use crate::core::{
    Asset, AssetReference, DataApi, DraftEdit, JobHandle, ObjectStore, Result, SessionId, WizardError,
    WizardEvent, WizardSnapshot, WizardStep, WorkflowEngine,
};
use crate::records::ClassRecord;
use super::manager_worker::WizardWorker;

/// Remote services a session talks to.
#[derive(Clone)]
pub struct WizardServices {
    pub store: Arc<dyn ObjectStore>,
    pub engine: Arc<dyn WorkflowEngine>,
    pub data: Arc<dyn DataApi>,
}

#[derive(Debug, Clone)]
pub struct WizardOptions {
    pub public_prefix: String,
    pub languages: Vec<String>,
    pub poller: PollerConfig,
    pub command_buffer: usize,
    pub event_buffer: usize,
}

impl WizardOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_prefix: config.storage.public_prefix.clone(),
            languages: config.wizard.languages.clone(),
            poller: config.poller.clone(),
            command_buffer: config.wizard.command_buffer,
            event_buffer: config.wizard.event_buffer,
        }
    }
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub(crate) enum WizardCommand {
    UploadVideo {
        asset: Asset,
        reply: oneshot::Sender<Result<AssetReference>>,
    },

    StartProcessing {
        reply: oneshot::Sender<Result<JobHandle>>,
    },

    /// Manual entry instead of AI processing
    SkipProcessing {
        reply: oneshot::Sender<Result<()>>,
    },

    Advance {
        reply: oneshot::Sender<Result<WizardStep>>,
    },

    GoBack {
        step: WizardStep,
        reply: oneshot::Sender<Result<()>>,
    },

    EditDraft {
        edit: DraftEdit,
        reply: oneshot::Sender<Result<()>>,
    },

    UploadThumbnail {
        asset: Asset,
        reply: oneshot::Sender<Result<AssetReference>>,
    },

    Commit {
        reply: oneshot::Sender<Result<ClassRecord>>,
    },

    Snapshot {
        reply: oneshot::Sender<WizardSnapshot>,
    },
}

/// Cloneable handle to one wizard session.
#[derive(Clone)]
pub struct WizardManager {
    session_id: SessionId,
    command_tx: mpsc::Sender<WizardCommand>,
    event_tx: broadcast::Sender<WizardEvent>,
    shutdown: CancellationToken,
}

/// Session handle holding the manager and the worker task
pub struct WizardSessionHandle {
    pub manager: WizardManager,
    pub worker_handle: JoinHandle<()>,
}

impl WizardSessionHandle {
    /// Closes the session. Any running poll is cancelled before this returns,
    /// even while clones of the manager are still alive.
    pub async fn shutdown(self) -> Result<()> {
        self.manager.close();
        drop(self.manager);
        self.worker_handle
            .await
            .map_err(|err| WizardError::internal(format!("Worker panic: {}", err)))
    }
}

impl WizardManager {
    /// Opens a session for a new class in `course_id`.
    pub fn open(
        services: WizardServices,
        options: WizardOptions,
        course_id: impl Into<String>,
        author: impl Into<String>,
    ) -> WizardSessionHandle {
        let session_id = SessionId::new();
        let (command_tx, command_rx) = mpsc::channel(options.command_buffer.max(1));
        let (event_tx, _) = broadcast::channel(options.event_buffer.max(1));
        let shutdown = CancellationToken::new();

        let worker_handle = tokio::spawn(WizardWorker::run(
            session_id,
            course_id.into(),
            author.into(),
            services,
            options,
            command_rx,
            event_tx.clone(),
            shutdown.clone(),
        ));

        WizardSessionHandle {
            manager: Self {
                session_id,
                command_tx,
                event_tx,
                shutdown,
            },
            worker_handle,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Stops the worker. Later requests from any clone fail with `SessionClosed`.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> WizardCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| WizardError::SessionClosed)?;

        reply_rx.await.map_err(|_| WizardError::SessionClosed)
    }

    /// Uploads the lesson video and moves to the processing step.
    pub async fn upload_video(&self, asset: Asset) -> Result<AssetReference> {
        self.request(|reply| WizardCommand::UploadVideo { asset, reply }).await?
    }

    /// Launches AI processing of the uploaded video.
    pub async fn start_processing(&self) -> Result<JobHandle> {
        self.request(|reply| WizardCommand::StartProcessing { reply }).await?
    }

    /// Chooses manual entry instead of AI processing.
    pub async fn skip_processing(&self) -> Result<()> {
        self.request(|reply| WizardCommand::SkipProcessing { reply }).await?
    }

    /// Moves one step forward and returns the new step.
    pub async fn advance(&self) -> Result<WizardStep> {
        self.request(|reply| WizardCommand::Advance { reply }).await?
    }

    /// Returns to an earlier step. Going back to processing or earlier
    /// cancels a running poll and clears a failed job; a finished job and
    /// its draft fields are kept.
    pub async fn go_back(&self, step: WizardStep) -> Result<()> {
        self.request(|reply| WizardCommand::GoBack { step, reply }).await?
    }

    pub async fn edit_draft(&self, edit: DraftEdit) -> Result<()> {
        self.request(|reply| WizardCommand::EditDraft { edit, reply }).await?
    }

    pub async fn upload_thumbnail(&self, asset: Asset) -> Result<AssetReference> {
        self.request(|reply| WizardCommand::UploadThumbnail { asset, reply }).await?
    }

    /// Saves the class. On success the session starts over with an empty draft.
    pub async fn commit(&self) -> Result<ClassRecord> {
        self.request(|reply| WizardCommand::Commit { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<WizardSnapshot> {
        self.request(|reply| WizardCommand::Snapshot { reply }).await
    }

    /// Subscribes to session events.
    ///
    /// Subscribers that fall behind lose events (lagged error).
    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.event_tx.subscribe()
    }
}
