use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use crate::core::{
    GraphQlError, JobHandle, JobStatus, JobSubmission, LaunchError, PollError, StatusReport,
    WorkflowEngine,
};
use super::client::GraphQlClient;

const START_PROCESSING: &str = r#"
mutation StartVideoProcessing($videoKey: String!, $bucketName: String!, $transcriptionKey: String!, $summarizedTextFileKey: String!, $languages: [String]) {
  startVideoProcessing(videoKey: $videoKey, bucketName: $bucketName, transcriptionKey: $transcriptionKey, summarizedTextFileKey: $summarizedTextFileKey, languages: $languages) {
    executionArn
  }
}"#;

const CHECK_STATUS: &str = r#"
query CheckExecutionStatus($executionArn: String!) {
  checkExecutionStatus(executionArn: $executionArn) {
    status
    output
  }
}"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartedExecution {
    execution_arn: Option<String>,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    output: Option<String>,
}

/// Workflow engine reached through the GraphQL API's custom operations.
#[derive(Clone)]
pub struct GraphQlWorkflowEngine {
    client: Arc<GraphQlClient>,
}

impl GraphQlWorkflowEngine {
    pub fn new(client: Arc<GraphQlClient>) -> Self {
        Self { client }
    }
}

fn parse_started(value: Value) -> Result<JobHandle, LaunchError> {
    let started: Option<StartedExecution> =
        serde_json::from_value(value).map_err(GraphQlError::from)?;

    started
        .and_then(|s| s.execution_arn)
        .filter(|arn| !arn.is_empty())
        .map(JobHandle)
        .ok_or(LaunchError::MissingHandle)
}

fn parse_status(value: Value) -> Result<StatusReport, PollError> {
    let status: Option<ExecutionStatus> =
        serde_json::from_value(value).map_err(GraphQlError::from)?;
    let status = status
        .ok_or_else(|| GraphQlError::EmptyData("checkExecutionStatus".to_string()))?;

    Ok(StatusReport {
        status: status.status.parse::<JobStatus>()?,
        output: status.output,
    })
}

#[async_trait]
impl WorkflowEngine for GraphQlWorkflowEngine {
    async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, LaunchError> {
        let variables = serde_json::to_value(submission).map_err(GraphQlError::from)?;

        let value = self
            .client
            .execute(START_PROCESSING, variables, "startVideoProcessing")
            .await
            .map_err(|err| match err {
                GraphQlError::Errors(messages) => LaunchError::Rejected(messages.join("; ")),
                other => LaunchError::Transport(other),
            })?;

        parse_started(value)
    }

    async fn status(&self, handle: &JobHandle) -> Result<StatusReport, PollError> {
        let value = self
            .client
            .execute(CHECK_STATUS, json!({ "executionArn": handle.as_str() }), "checkExecutionStatus")
            .await?;

        parse_status(value)
    }
}
