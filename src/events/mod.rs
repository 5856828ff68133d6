//! Record lifecycle events consumed from the trigger framework.
//!
//! One `Event` is produced per record mutation. The trigger framework
//! delivers at least once, so the same event may arrive more than once.

use serde::{Deserialize, Serialize};

/// Collection a mutated record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Accounts (admins, job providers, seekers)
    Users,
    /// Job applications submitted by seekers
    Applications,
    /// Job postings
    Jobs,
    /// Any collection this service has no flow for
    #[serde(other)]
    Other,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Users => "users",
            RecordKind::Applications => "applications",
            RecordKind::Jobs => "jobs",
            RecordKind::Other => "other",
        }
    }
}

/// Field-level view of a stored record.
///
/// Field names follow the datastore documents (`firstName`, `fcmToken`,
/// `providerStatus` ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSnapshot(serde_json::Map<String, serde_json::Value>);

impl RecordSnapshot {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }

    /// String field, treating empty strings as absent
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// `first last` joined and trimmed; `None` when both are missing or blank
    pub fn full_name(&self, first_key: &str, last_key: &str) -> Option<String> {
        let first = self.str_field(first_key).unwrap_or_default();
        let last = self.str_field(last_key).unwrap_or_default();
        let name = format!("{} {}", first, last).trim().to_string();
        (!name.is_empty()).then_some(name)
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

impl From<serde_json::Value> for RecordSnapshot {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// A record mutation delivered by the trigger framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RecordCreated {
        kind: RecordKind,
        record_id: String,
        record: RecordSnapshot,
    },
    RecordUpdated {
        kind: RecordKind,
        record_id: String,
        before: RecordSnapshot,
        after: RecordSnapshot,
    },
}

impl Event {
    pub fn created(kind: RecordKind, record_id: impl Into<String>, record: RecordSnapshot) -> Self {
        Event::RecordCreated {
            kind,
            record_id: record_id.into(),
            record,
        }
    }

    pub fn updated(
        kind: RecordKind,
        record_id: impl Into<String>,
        before: RecordSnapshot,
        after: RecordSnapshot,
    ) -> Self {
        Event::RecordUpdated {
            kind,
            record_id: record_id.into(),
            before,
            after,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Event::RecordCreated { kind, .. } | Event::RecordUpdated { kind, .. } => *kind,
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            Event::RecordCreated { record_id, .. } | Event::RecordUpdated { record_id, .. } => {
                record_id
            }
        }
    }

    /// Short label for logs and metrics, e.g. `users.created`
    pub fn label(&self) -> String {
        let action = match self {
            Event::RecordCreated { .. } => "created",
            Event::RecordUpdated { .. } => "updated",
        };
        format!("{}.{}", self.kind().as_str(), action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_created_event() {
        let event: Event = serde_json::from_value(json!({
            "type": "record_created",
            "kind": "users",
            "record_id": "u-1",
            "record": { "role": "job_provider", "firstName": "Ada" }
        }))
        .unwrap();

        assert_eq!(event.kind(), RecordKind::Users);
        assert_eq!(event.record_id(), "u-1");
        assert_eq!(event.label(), "users.created");
    }

    #[test]
    fn test_parse_updated_event() {
        let event: Event = serde_json::from_value(json!({
            "type": "record_updated",
            "kind": "users",
            "record_id": "u-1",
            "before": { "providerStatus": "pending" },
            "after": { "providerStatus": "approved" }
        }))
        .unwrap();

        match event {
            Event::RecordUpdated { before, after, .. } => {
                assert_eq!(before.str_field("providerStatus"), Some("pending"));
                assert_eq!(after.str_field("providerStatus"), Some("approved"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_maps_to_other() {
        let event: Event = serde_json::from_value(json!({
            "type": "record_created",
            "kind": "invoices",
            "record_id": "i-1",
            "record": {}
        }))
        .unwrap();
        assert_eq!(event.kind(), RecordKind::Other);
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = RecordSnapshot::from(json!({
            "firstName": "  Ada",
            "lastName": "",
            "fcmToken": "",
            "count": 3
        }));

        assert_eq!(snapshot.str_field("fcmToken"), None);
        assert_eq!(snapshot.str_field("count"), None);
        assert_eq!(snapshot.full_name("firstName", "lastName"), Some("Ada".to_string()));
        assert_eq!(RecordSnapshot::default().full_name("firstName", "lastName"), None);
    }
}
