use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Can't read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

// Serializes Duration as whole seconds
fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub graphql: GraphQlConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        config_str.parse()
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Object storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL objects are `PUT` under
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    /// Canonical public prefix substituted for the storage endpoint
    pub public_prefix: String,
    pub chunk_size: usize,
    pub timeout_secs: u64,
    pub token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: "amplify-s3-ryz".to_string(),
            region: "us-east-1".to_string(),
            public_prefix: "https://d28jhwy9xe688b.cloudfront.net".to_string(),
            chunk_size: 1024 * 1024, // 1MB
            timeout_secs: 300,
            token: None,
        }
    }
}

/// Hosted GraphQL API serving both the workflow operations and the records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphQlConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Interval between status queries
    #[serde(rename = "poll_interval_secs", serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,

    /// Interval between progress estimates
    #[serde(rename = "progress_interval_secs", serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub progress_interval: Duration,

    /// Expected job duration the cosmetic estimate is based on
    #[serde(rename = "estimated_duration_secs", serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub estimated_duration: Duration,

    /// Extra attempts for a failed status query; 0 keeps the fail-fast behavior
    pub status_retries: u32,

    #[serde(rename = "retry_delay_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
    pub retry_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            progress_interval: Duration::from_secs(1),
            estimated_duration: Duration::from_secs(120),
            status_retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Transcription languages sent with every job
    pub languages: Vec<String>,
    /// Command buffer of the session actor
    pub command_buffer: usize,
    /// Events buffered per subscriber
    pub event_buffer: usize,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            languages: vec!["english".to_string()],
            command_buffer: 32,
            event_buffer: 256,
        }
    }
}
