//! PostgreSQL-backed record and log stores.
//!
//! Table structure (see `migrations/001_fanout.sql`):
//! - `accounts` - id, role, fcm_token
//! - `jobs` - id, provider_id, title
//! - `notification_log` - one row per recipient per notification

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::{Notification, NotificationKind, NotificationLogEntry, PendingLogEntry};

use super::log_store::{LogStoreError, NotificationLogStore};
use super::records::{AccountRecord, JobRecord, RecordStore, RecordStoreError};

/// PostgreSQL record store.
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn accounts_with_role(&self, role: &str) -> Result<Vec<AccountRecord>, RecordStoreError> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, role, fcm_token
            FROM accounts
            WHERE role = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, role, token)| AccountRecord::new(id, role, token.as_deref()))
            .collect())
    }

    async fn account(&self, id: &str) -> Result<Option<AccountRecord>, RecordStoreError> {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT id, role, fcm_token FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, role, token)| AccountRecord::new(id, role, token.as_deref())))
    }

    async fn job(&self, id: &str) -> Result<Option<JobRecord>, RecordStoreError> {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT id, provider_id, title FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, provider_id, title)| JobRecord::new(id, provider_id, title.as_deref())))
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

/// PostgreSQL notification log.
///
/// A batch is one transaction: every insert runs inside it and the commit
/// publishes them together. An error before commit drops the transaction,
/// which rolls back whatever was already inserted.
pub struct PostgresLogStore {
    pool: PgPool,
}

impl PostgresLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type LogRow = (
    Uuid,
    String,
    String,
    String,
    String,
    Json<BTreeMap<String, String>>,
    Option<String>,
    bool,
    DateTime<Utc>,
);

#[async_trait]
impl NotificationLogStore for PostgresLogStore {
    async fn commit_batch(&self, entries: Vec<PendingLogEntry>) -> Result<usize, LogStoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        // Serialize everything before touching the database
        let rows = entries
            .iter()
            .map(|entry| {
                if entry.recipient_id.is_empty() {
                    return Err(LogStoreError::MissingRecipient(entry.id));
                }
                Ok((entry, serde_json::to_value(entry.notification.data())?))
            })
            .collect::<Result<Vec<_>, LogStoreError>>()?;

        let mut tx = self.pool.begin().await?;

        for (entry, data) in &rows {
            let notification = &entry.notification;
            let kind = notification.kind();
            sqlx::query(
                r#"
                INSERT INTO notification_log
                    (id, recipient_id, kind, category, title, body, data, action_url, is_read, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, NOW())
                "#,
            )
            .bind(entry.id)
            .bind(&entry.recipient_id)
            .bind(kind.as_str())
            .bind(kind.category().as_str())
            .bind(notification.title())
            .bind(notification.body())
            .bind(data)
            .bind(notification.action_reference())
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    LogStoreError::Conflict(entry.id)
                }
                _ => LogStoreError::Postgres(e),
            })?;
        }

        tx.commit().await?;

        tracing::trace!(count = rows.len(), "Committed notification log batch to PostgreSQL");

        Ok(rows.len())
    }

    async fn entries_for(&self, recipient_id: &str) -> Result<Vec<NotificationLogEntry>, LogStoreError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, recipient_id, kind, title, body, data, action_url, is_read, created_at
            FROM notification_log
            WHERE recipient_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .filter_map(
                |(id, recipient_id, kind, title, body, Json(data), action_url, is_read, created_at)| {
                    let Some(kind) = NotificationKind::parse(&kind) else {
                        tracing::warn!(
                            entry_id = %id,
                            kind = %kind,
                            "Skipping notification log row with unknown kind"
                        );
                        return None;
                    };

                    let mut builder = Notification::builder(kind, title, body).data_entries(data);
                    if let Some(action) = action_url {
                        builder = builder.action_reference(action);
                    }

                    Some(NotificationLogEntry {
                        id,
                        recipient_id,
                        notification: builder.build(),
                        is_read,
                        created_at,
                    })
                },
            )
            .collect();

        Ok(entries)
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
