//! Typed records stored behind the data API.

mod filter;
mod memory;
mod repository;
mod rewards;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::core::RecordKind;

pub use filter::Filter;
pub use memory::MemoryDataApi;
pub use repository::Repository;
pub use rewards::{award_points, WATCH_REWARD_POINTS};

/// A record kind with a server-issued id.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const KIND: RecordKind;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
}

impl Record for Course {
    const KIND: RecordKind = RecordKind::Course;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCourse {
    pub name: String,
}

/// A class (lesson) belonging to a course - what the wizard persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    pub course_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(rename = "class_flag", default)]
    pub class_flag: i64,
}

impl Record for ClassRecord {
    const KIND: RecordKind = RecordKind::Class;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub course_id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub author: String,
    pub image: String,
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(rename = "class_flag")]
    pub class_flag: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub class_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub comment_version: Option<String>,
}

impl Record for Comment {
    const KIND: RecordKind = RecordKind::Comment;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub class_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_version: Option<String>,
}

/// Points a user earned on a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub user_id: String,
    pub class_id: String,
    #[serde(default)]
    pub point: i64,
}

impl Record for Reward {
    const KIND: RecordKind = RecordKind::Reward;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReward {
    pub user_id: String,
    pub class_id: String,
    pub point: i64,
}
