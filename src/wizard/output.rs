//! Validation of the workflow engine's output payload.
//!
//! A payload is either well-formed, possibly with placeholders for fields the
//! engine left out, or malformed. Malformed output is reported as a processing
//! failure instead of being papered over.

use serde_json::{Map, Value};
use crate::core::{JobOutput, PollError};

pub const PLACEHOLDER_TITLE: &str = "AI-generated title";
pub const PLACEHOLDER_DESCRIPTION: &str = "AI-generated description";
pub const PLACEHOLDER_TRANSCRIPT: &str = "AI-generated transcript";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputClassification {
    WellFormed(JobOutput),
    Malformed(String),
}

pub fn classify_output(raw: Option<&str>) -> OutputClassification {
    let raw = match raw.map(str::trim) {
        None | Some("") => return OutputClassification::WellFormed(placeholders()),
        Some(raw) => raw,
    };

    let object = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            return OutputClassification::Malformed(format!(
                "expected a JSON object, found {}",
                type_name(&other)
            ));
        }
        Err(err) => return OutputClassification::Malformed(format!("invalid JSON: {}", err)),
    };

    match read_fields(&object) {
        Ok(output) => OutputClassification::WellFormed(output),
        Err(reason) => OutputClassification::Malformed(reason),
    }
}

/// Like [`classify_output`], as a `Result` for the poller.
pub fn parse_output(raw: Option<&str>) -> Result<JobOutput, PollError> {
    match classify_output(raw) {
        OutputClassification::WellFormed(output) => Ok(output),
        OutputClassification::Malformed(reason) => Err(PollError::MalformedOutput(reason)),
    }
}

fn placeholders() -> JobOutput {
    JobOutput {
        title: PLACEHOLDER_TITLE.to_string(),
        description: PLACEHOLDER_DESCRIPTION.to_string(),
        transcript: PLACEHOLDER_TRANSCRIPT.to_string(),
        subtitle: None,
    }
}

fn read_fields(object: &Map<String, Value>) -> Result<JobOutput, String> {
    let title = string_field(object, "title")?;
    let description = string_field(object, "description")?;
    let transcript = string_field(object, "transcript")?;
    let subtitle = string_field(object, "subtitle")?;

    Ok(JobOutput {
        title: title.unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        description: description.unwrap_or_else(|| PLACEHOLDER_DESCRIPTION.to_string()),
        transcript: transcript.unwrap_or_else(|| PLACEHOLDER_TRANSCRIPT.to_string()),
        subtitle,
    })
}

/// Missing, null and empty all read as `None`.
fn string_field(object: &Map<String, Value>, field: &str) -> Result<Option<String>, String> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("field `{}` must be a string, found {}", field, type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
