//! In-memory record and log stores.
//!
//! Data lives in process and is lost on restart. Used by default and by
//! the integration tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::notification::{NotificationLogEntry, PendingLogEntry};

use super::log_store::{LogStoreError, NotificationLogStore};
use super::records::{AccountRecord, JobRecord, RecordStore, RecordStoreError};

/// In-memory account and job records.
///
/// Each account keeps the sequence number it was inserted with so role
/// queries return insertion order.
#[derive(Default)]
pub struct MemoryRecordStore {
    accounts: DashMap<String, (u64, AccountRecord)>,
    jobs: DashMap<String, JobRecord>,
    next_seq: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account. Replacing keeps the original position.
    pub fn upsert_account(&self, account: AccountRecord) {
        match self.accounts.entry(account.id.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().1 = account,
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert((seq, account));
            }
        }
    }

    pub fn upsert_job(&self, job: JobRecord) {
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn accounts_with_role(&self, role: &str) -> Result<Vec<AccountRecord>, RecordStoreError> {
        let mut matching: Vec<(u64, AccountRecord)> = self
            .accounts
            .iter()
            .filter(|entry| entry.value().1.role == role)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|(seq, _)| *seq);

        Ok(matching.into_iter().map(|(_, account)| account).collect())
    }

    async fn account(&self, id: &str) -> Result<Option<AccountRecord>, RecordStoreError> {
        Ok(self.accounts.get(id).map(|entry| entry.value().1.clone()))
    }

    async fn job(&self, id: &str) -> Result<Option<JobRecord>, RecordStoreError> {
        Ok(self.jobs.get(id).map(|entry| entry.value().clone()))
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct LogState {
    entries: Vec<NotificationLogEntry>,
    ids: HashSet<uuid::Uuid>,
}

/// In-memory notification log.
///
/// A batch is validated in full while holding the write lock and only then
/// appended, so readers never observe part of a batch.
#[derive(Default)]
pub struct MemoryLogStore {
    state: RwLock<LogState>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries committed so far
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every committed entry, in commit order
    pub async fn all_entries(&self) -> Vec<NotificationLogEntry> {
        self.state.read().await.entries.clone()
    }
}

#[async_trait]
impl NotificationLogStore for MemoryLogStore {
    async fn commit_batch(&self, entries: Vec<PendingLogEntry>) -> Result<usize, LogStoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write().await;

        let mut staged_ids = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.recipient_id.is_empty() {
                return Err(LogStoreError::MissingRecipient(entry.id));
            }
            if state.ids.contains(&entry.id) || !staged_ids.insert(entry.id) {
                return Err(LogStoreError::Conflict(entry.id));
            }
        }

        let created_at = Utc::now();
        let count = entries.len();
        for entry in entries {
            state.ids.insert(entry.id);
            state.entries.push(entry.committed_at(created_at));
        }

        tracing::trace!(count = count, "Committed notification log batch in memory");

        Ok(count)
    }

    async fn entries_for(&self, recipient_id: &str) -> Result<Vec<NotificationLogEntry>, LogStoreError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.recipient_id == recipient_id)
            .cloned()
            .collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
