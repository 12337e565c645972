use std::env;
use std::sync::Arc;
use anyhow::{bail, Context};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use class_wizard::config::Config;
use class_wizard::graphql::{GraphQlClient, GraphQlDataApi, GraphQlWorkflowEngine};
use class_wizard::storage::HttpObjectStore;
use class_wizard::{logging, Asset, ProcessingState, WizardEvent, WizardManager, WizardOptions, WizardServices, WizardStep};

const USAGE: &str = "usage: class-wizard <course-id> <author> <video> <thumbnail> [--skip-ai]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let skip_ai = args.iter().any(|arg| arg == "--skip-ai");
    let positional: Vec<&String> = args.iter().filter(|arg| !arg.starts_with("--")).collect();
    let [course_id, author, video, thumbnail] = positional.as_slice() else {
        bail!(USAGE);
    };

    let config_path = env::var("CLASS_WIZARD_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path).with_context(|| format!("loading {}", config_path))?;

    let client = Arc::new(GraphQlClient::new(&config.graphql)?);
    let services = WizardServices {
        store: Arc::new(HttpObjectStore::new(&config.storage)?),
        engine: Arc::new(GraphQlWorkflowEngine::new(client.clone())),
        data: Arc::new(GraphQlDataApi::new(client)),
    };

    let session = WizardManager::open(services, WizardOptions::from_config(&config), course_id.as_str(), author.as_str());
    let wizard = session.manager.clone();
    let mut events = wizard.subscribe_events();

    let reference = wizard.upload_video(Asset::from_file(video.as_str()).await?).await?;
    info!(url = %reference.public_url, "Video uploaded");

    if skip_ai {
        wizard.skip_processing().await?;
    } else {
        let job = wizard.start_processing().await?;
        info!(%job, "Waiting for processing");
        loop {
            match events.recv().await {
                Ok(WizardEvent::ProcessingProgress { percentage, .. }) => info!(percentage, "Processing"),
                Ok(WizardEvent::ProcessingStateChanged { new_state: ProcessingState::Completed, .. }) => break,
                Ok(WizardEvent::ProcessingStateChanged { new_state: ProcessingState::Failed(reason), .. }) => {
                    bail!("processing failed: {}", reason);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed wizard events"),
                Err(RecvError::Closed) => bail!("wizard session closed"),
            }
        }
    }

    if wizard.advance().await? != WizardStep::Review {
        bail!("wizard did not reach the review step");
    }
    wizard.upload_thumbnail(Asset::from_file(thumbnail.as_str()).await?).await?;

    let record = wizard.commit().await?;
    info!(class_id = %record.id, name = %record.name, "Class created");

    drop(wizard);
    session.shutdown().await?;
    Ok(())
}
