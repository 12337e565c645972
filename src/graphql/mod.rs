mod client;
mod data;
mod workflow;

pub use client::GraphQlClient;
pub use data::GraphQlDataApi;
pub use workflow::GraphQlWorkflowEngine;
