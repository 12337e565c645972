use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::config::GraphQlConfig;
use crate::core::GraphQlError;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// Process-wide handle to the hosted GraphQL API. Built once at start-up and shared.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GraphQlClient {
    pub fn new(config: &GraphQlConfig) -> Result<Self, GraphQlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn create_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(api_key) {
                headers.insert("x-api-key", value);
            }
        }
        headers
    }

    /// Runs one operation and returns the value of its top-level `field`.
    /// The value may be `null`; a response without `data` is an error.
    pub async fn execute(&self, query: &str, variables: Value, field: &str) -> Result<Value, GraphQlError> {
        debug!(field, "GraphQL request");

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.create_headers())
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GraphQlError::Status {
                status_code: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        extract_field(serde_json::from_slice(&body)?, field)
    }
}

fn extract_field(response: GraphQlResponse, field: &str) -> Result<Value, GraphQlError> {
    if !response.errors.is_empty() {
        return Err(GraphQlError::Errors(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }

    match response.data {
        Some(mut data) => Ok(data
            .get_mut(field)
            .map(Value::take)
            .unwrap_or(Value::Null)),
        None => Err(GraphQlError::EmptyData(field.to_string())),
    }
}
