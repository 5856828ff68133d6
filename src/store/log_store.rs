//! Batch primitive for the in-app notification log.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{NotificationLogEntry, PendingLogEntry};

/// Errors that can occur while committing or reading the notification log.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// An entry with this id already exists
    #[error("Notification log entry {0} already exists")]
    Conflict(Uuid),

    /// An entry is not addressed to anyone
    #[error("Notification log entry {0} has no recipient")]
    MissingRecipient(Uuid),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Atomic batch writer for notification log entries.
///
/// `commit_batch` either makes every entry durable or none of them. The
/// datastore assigns `created_at`, identical for the whole batch.
#[async_trait]
pub trait NotificationLogStore: Send + Sync {
    /// Commit all entries together. Returns the number committed.
    async fn commit_batch(&self, entries: Vec<PendingLogEntry>) -> Result<usize, LogStoreError>;

    /// Entries for one recipient, newest first
    async fn entries_for(&self, recipient_id: &str) -> Result<Vec<NotificationLogEntry>, LogStoreError>;

    /// Backend type identifier
    fn backend_type(&self) -> &'static str;
}
