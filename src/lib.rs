pub mod config;
pub mod core;
pub mod graphql;
pub mod logging;
pub mod records;
pub mod storage;
pub mod utils;
pub mod wizard;

// Re-export the core types
pub use core::{
    Asset,
    AssetKind,
    AssetReference,
    DraftEdit,
    JobHandle,
    JobStatus,
    ProcessingState,
    Result,
    WizardError,
    WizardEvent,
    WizardSnapshot,
    WizardStep,
};

pub use wizard::{
    WizardManager,
    WizardOptions,
    WizardServices,
    WizardSessionHandle,
};
