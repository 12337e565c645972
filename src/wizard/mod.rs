//! The class-creation wizard: upload, AI processing, review and commit.

mod launcher;
mod manager;
mod manager_worker;
pub mod output;
mod poller;
mod review;
mod upload;

pub use launcher::{base_name, DerivedNames, ProcessingLauncher};
pub use manager::{WizardManager, WizardOptions, WizardServices, WizardSessionHandle};
pub use output::{classify_output, parse_output, OutputClassification};
pub use poller::{estimate_progress, PollEvent, PollHandle, PollMessage, StatusPoller, ESTIMATE_CEILING};
pub use review::ReviewStage;
pub use upload::UploadCoordinator;
