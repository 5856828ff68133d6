use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Data key that always mirrors the notification kind
pub const DATA_TYPE_KEY: &str = "type";

/// What a notification is about. Serialized into `data.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A job provider registered and awaits admin approval
    NewProvider,
    /// A job provider's account status changed
    StatusUpdate,
    /// A seeker applied to one of a provider's jobs
    NewApplication,
}

/// Coarse grouping the in-app log files entries under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    System,
    StatusUpdate,
    Application,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewProvider => "new_provider",
            NotificationKind::StatusUpdate => "status_update",
            NotificationKind::NewApplication => "new_application",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            NotificationKind::NewProvider => NotificationCategory::System,
            NotificationKind::StatusUpdate => NotificationCategory::StatusUpdate,
            NotificationKind::NewApplication => NotificationCategory::Application,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new_provider" => Some(NotificationKind::NewProvider),
            "status_update" => Some(NotificationKind::StatusUpdate),
            "new_application" => Some(NotificationKind::NewApplication),
            _ => None,
        }
    }
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::System => "system",
            NotificationCategory::StatusUpdate => "status_update",
            NotificationCategory::Application => "application",
        }
    }
}

/// Channel-agnostic notification shared by the push and log channels.
///
/// Immutable once built. `data["type"]` always equals `kind.as_str()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    kind: NotificationKind,
    title: String,
    body: String,
    data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action_reference: Option<String>,
}

impl Notification {
    pub fn builder(
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> NotificationBuilder {
        NotificationBuilder::new(kind, title, body)
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn action_reference(&self) -> Option<&str> {
        self.action_reference.as_deref()
    }
}

/// Builder for notifications
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    kind: NotificationKind,
    title: String,
    body: String,
    data: BTreeMap<String, String>,
    action_reference: Option<String>,
}

impl NotificationBuilder {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
            action_reference: None,
        }
    }

    /// Add a data entry. The `type` key is reserved for the kind and ignored.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key != DATA_TYPE_KEY {
            self.data.insert(key, value.into());
        }
        self
    }

    /// Merge several data entries
    pub fn data_entries<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self = self.data(key, value);
        }
        self
    }

    /// Set the in-app link the notification opens
    pub fn action_reference(mut self, reference: impl Into<String>) -> Self {
        self.action_reference = Some(reference.into());
        self
    }

    pub fn build(mut self) -> Notification {
        self.data
            .insert(DATA_TYPE_KEY.to_string(), self.kind.as_str().to_string());
        Notification {
            kind: self.kind,
            title: self.title,
            body: self.body,
            data: self.data,
            action_reference: self.action_reference,
        }
    }
}

/// An account eligible to receive a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    /// Push token; absent when the account never registered a device
    pub address: Option<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>, address: Option<String>) -> Self {
        Self {
            id: id.into(),
            address: address.filter(|a| !a.is_empty()),
        }
    }

    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }
}

/// Per-address result of one multicast push
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub recipient_id: String,
    pub address: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(recipient_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            address: address.into(),
            success: true,
            error_reason: None,
        }
    }

    pub fn failed(
        recipient_id: impl Into<String>,
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            address: address.into(),
            success: false,
            error_reason: Some(reason.into()),
        }
    }
}

/// Log entry staged for a batch, before the datastore stamps it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogEntry {
    pub id: Uuid,
    pub recipient_id: String,
    pub notification: Notification,
}

impl PendingLogEntry {
    pub fn new(recipient_id: impl Into<String>, notification: Notification) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            notification,
        }
    }

    /// Stamp with the commit timestamp
    pub fn committed_at(self, created_at: DateTime<Utc>) -> NotificationLogEntry {
        NotificationLogEntry {
            id: self.id,
            recipient_id: self.recipient_id,
            notification: self.notification,
            is_read: false,
            created_at,
        }
    }
}

/// Persisted in-app notification for exactly one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationLogEntry {
    pub id: Uuid,
    pub recipient_id: String,
    pub notification: Notification,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// What the push channel actually sends: title, body and a flat data map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    /// Strip a notification down to its push form, adding `click_action`
    pub fn from_notification(notification: &Notification, click_action: Option<&str>) -> Self {
        let mut data = notification.data().clone();
        if let Some(action) = click_action.filter(|a| !a.is_empty()) {
            data.insert("click_action".to_string(), action.to_string());
        }
        Self {
            title: notification.title().to_string(),
            body: notification.body().to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_type_from_kind() {
        let notification = Notification::builder(NotificationKind::StatusUpdate, "t", "b")
            .data("type", "spoofed")
            .data("newStatus", "approved")
            .build();

        assert_eq!(notification.data()["type"], "status_update");
        assert_eq!(notification.data()["newStatus"], "approved");
        assert_eq!(notification.action_reference(), None);
    }

    #[test]
    fn test_kind_round_trip_and_category() {
        for kind in [
            NotificationKind::NewProvider,
            NotificationKind::StatusUpdate,
            NotificationKind::NewApplication,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::NewProvider.category().as_str(), "system");
        assert_eq!(NotificationKind::NewApplication.category().as_str(), "application");
        assert_eq!(NotificationKind::parse("nope"), None);
    }

    #[test]
    fn test_push_message_adds_click_action() {
        let notification = Notification::builder(NotificationKind::NewProvider, "Title", "Body")
            .data("providerId", "p-1")
            .action_reference("/admin/users/p-1")
            .build();

        let push = PushMessage::from_notification(&notification, Some("OPEN_APP"));
        assert_eq!(push.title, "Title");
        assert_eq!(push.data["click_action"], "OPEN_APP");
        assert_eq!(push.data["providerId"], "p-1");
        assert!(!notification.data().contains_key("click_action"));

        let bare = PushMessage::from_notification(&notification, None);
        assert!(!bare.data.contains_key("click_action"));
    }

    #[test]
    fn test_recipient_ignores_empty_address() {
        assert!(!Recipient::new("a", Some(String::new())).has_address());
        assert!(Recipient::new("a", Some("tok".into())).has_address());
    }

    #[test]
    fn test_pending_entry_commit() {
        let notification = Notification::builder(NotificationKind::NewProvider, "t", "b").build();
        let pending = PendingLogEntry::new("admin-1", notification.clone());
        let id = pending.id;
        let now = Utc::now();

        let entry = pending.committed_at(now);
        assert_eq!(entry.id, id);
        assert_eq!(entry.recipient_id, "admin-1");
        assert!(!entry.is_read);
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.notification, notification);
    }
}
