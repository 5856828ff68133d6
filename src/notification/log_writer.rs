use std::sync::Arc;

use crate::metrics::LogMetrics;
use crate::store::{LogStoreError, NotificationLogStore};

use super::{Notification, PendingLogEntry, Recipient};

/// Persists one in-app log entry per recipient as a single atomic batch.
///
/// Independent of push delivery: it runs whatever the push outcome.
pub struct NotificationLogWriter {
    store: Arc<dyn NotificationLogStore>,
}

impl NotificationLogWriter {
    pub fn new(store: Arc<dyn NotificationLogStore>) -> Self {
        Self { store }
    }

    /// Write one entry per recipient, all or nothing. Returns the count.
    #[tracing::instrument(
        name = "log_writer.persist",
        skip(self, recipients, notification),
        fields(kind = %notification.kind().as_str(), recipient_count = recipients.len())
    )]
    pub async fn persist(
        &self,
        recipients: &[Recipient],
        notification: &Notification,
    ) -> Result<usize, LogStoreError> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let batch: Vec<PendingLogEntry> = recipients
            .iter()
            .map(|r| PendingLogEntry::new(r.id.clone(), notification.clone()))
            .collect();

        match self.store.commit_batch(batch).await {
            Ok(count) => {
                LogMetrics::record_persisted(count as u64);
                tracing::info!(count = count, "Notification log batch committed");
                Ok(count)
            }
            Err(e) => {
                LogMetrics::record_batch_failure();
                tracing::error!(error = %e, "Notification log batch failed");
                Err(e)
            }
        }
    }
}
