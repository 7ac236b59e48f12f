//! Entity records returned by the API.
//!
//! These are plain data. Every field the server may omit (because of
//! `opt_fields` or compact representations) is optional or defaulted, so a
//! compact `{"id": .., "name": ..}` record decodes into any of them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Ids arrive as JSON strings or, from older API versions, as integers.
fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(n) => n.to_string(),
    })
}

/// Compact reference to any entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Compact {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_organization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<Compact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization: Option<Compact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub owner: Option<Compact>,
    #[serde(default)]
    pub team: Option<Compact>,
    #[serde(default)]
    pub workspace: Option<Compact>,
    #[serde(default)]
    pub members: Vec<Compact>,
    #[serde(default)]
    pub followers: Vec<Compact>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee: Option<Compact>,
    #[serde(default)]
    pub assignee_status: Option<String>,
    #[serde(default)]
    pub parent: Option<Compact>,
    #[serde(default)]
    pub projects: Vec<Compact>,
    #[serde(default)]
    pub tags: Vec<Compact>,
    #[serde(default)]
    pub followers: Vec<Compact>,
    #[serde(default)]
    pub workspace: Option<Compact>,
    #[serde(default)]
    pub num_hearts: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub workspace: Option<Compact>,
    #[serde(default)]
    pub followers: Vec<Compact>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Webhook {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default)]
    pub resource: Option<Compact>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub active: bool,
}

/// One change reported by the events feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    #[serde(default)]
    pub action: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    pub resource: Compact,
    #[serde(default)]
    pub parent: Option<Compact>,
    #[serde(default)]
    pub user: Option<Compact>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_record_decodes_as_full_entity() {
        let project: Project = serde_json::from_str(r#"{"id":"12","name":"Roadmap"}"#).unwrap();
        assert_eq!(project.name, "Roadmap");
        assert!(project.members.is_empty());
        assert!(project.created_at.is_none());
    }

    #[test]
    fn task_dates_parse() {
        let task: Task = serde_json::from_str(
            r#"{"id":"3","name":"Ship","due_on":"2024-05-01","created_at":"2024-04-01T10:00:00Z","completed":true}"#,
        )
        .unwrap();
        assert!(task.completed);
        assert_eq!(task.due_on, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(task.created_at.is_some());
    }

    #[test]
    fn event_type_field_is_renamed() {
        let event: Event = serde_json::from_str(
            r#"{"action":"changed","type":"task","resource":{"id":"9","name":"t"}}"#,
        )
        .unwrap();
        assert_eq!(event.resource_type, "task");
        assert_eq!(event.resource.id, "9");
    }

    #[test]
    fn numeric_ids_decode_as_strings() {
        let project: Project = serde_json::from_str(r#"{"id":1234,"name":"Roadmap"}"#).unwrap();
        assert_eq!(project.id, "1234");

        let event: Event = serde_json::from_str(
            r#"{"action":"added","type":"task","resource":{"id":9876543210},"parent":{"id":"12"}}"#,
        )
        .unwrap();
        assert_eq!(event.resource.id, "9876543210");
        assert_eq!(event.parent.unwrap().id, "12");
    }

    #[test]
    fn fractional_id_is_a_shape_mismatch() {
        let result: Result<Task, _> = serde_json::from_str(r#"{"id":1.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_id_is_a_shape_mismatch() {
        let result: Result<Task, _> = serde_json::from_str(r#"{"name":"no id"}"#);
        assert!(result.is_err());
    }
}
