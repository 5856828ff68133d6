use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::events::{Event, RecordKind, RecordSnapshot};
use crate::metrics::InvocationMetrics;
use crate::store::RecordStore;
use crate::telemetry::attributes;

use super::composer::{compose, NotificationFields};
use super::hygiene::{report_invalid, StaleTokenHandler};
use super::resolver::{push_targets, RecipientCriteria, RecipientResolver};
use super::transitions::map_transition;
use super::{DeliveryFanout, Notification, NotificationKind, NotificationLogWriter, Recipient};

const PROVIDER_ROLE: &str = "job_provider";
const ADMIN_ROLE: &str = "admin";

/// Why an invocation did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The account is not a job provider
    NotJobProvider,
    /// Nobody to notify (e.g. no admin has a push token)
    NoRecipients,
    /// The provider status did not change
    StatusUnchanged,
    /// The new provider status has no notification
    UnrecognizedStatus,
    /// No flow handles this record kind and mutation
    UnhandledEvent,
}

/// Invocation-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// A referenced record (job, provider) is missing
    #[error("{0}")]
    RelatedRecordNotFound(String),

    /// Recipient or related-record query failed
    #[error("{0}")]
    RecipientQueryFailure(String),

    /// The multicast push call failed as a whole
    #[error("{0}")]
    ChannelCallFailure(String),

    /// The notification log batch did not commit
    #[error("{0}")]
    BatchCommitFailure(String),
}

impl InvocationError {
    pub fn code(&self) -> &'static str {
        match self {
            InvocationError::RelatedRecordNotFound(_) => "RelatedRecordNotFound",
            InvocationError::RecipientQueryFailure(_) => "RecipientQueryFailure",
            InvocationError::ChannelCallFailure(_) => "ChannelCallFailure",
            InvocationError::BatchCommitFailure(_) => "BatchCommitFailure",
        }
    }
}

impl Serialize for InvocationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("InvocationError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Structured result of one event invocation.
///
/// `success` holds exactly when `errors` is empty. Push and log failures
/// are independent, so both may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub sent_count: usize,
    pub failed_count: usize,
    pub logged_count: usize,
    pub invalid_addresses: Vec<String>,
    pub skipped: Option<SkipReason>,
    pub errors: Vec<InvocationError>,
}

impl InvocationOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    pub fn failed(error: InvocationError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any
    pub fn error(&self) -> Option<&InvocationError> {
        self.errors.first()
    }
}

impl Serialize for InvocationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("InvocationOutcome", 8)?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("sent_count", &self.sent_count)?;
        state.serialize_field("failed_count", &self.failed_count)?;
        state.serialize_field("logged_count", &self.logged_count)?;
        state.serialize_field("invalid_addresses", &self.invalid_addresses)?;
        state.serialize_field("skipped", &self.skipped)?;
        state.serialize_field("error", &self.error().map(InvocationError::code))?;
        state.serialize_field("errors", &self.errors)?;
        state.end()
    }
}

/// Statistics for the event dispatcher
#[derive(Debug, Default)]
struct DispatcherStats {
    events: AtomicU64,
    succeeded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    pushes_sent: AtomicU64,
    pushes_failed: AtomicU64,
    entries_logged: AtomicU64,
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub events: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub pushes_sent: u64,
    pub pushes_failed: u64,
    pub entries_logged: u64,
}

impl DispatcherStats {
    fn record(&self, outcome: &InvocationOutcome) {
        self.events.fetch_add(1, Ordering::Relaxed);
        if !outcome.success() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        } else if outcome.skipped.is_some() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        self.pushes_sent
            .fetch_add(outcome.sent_count as u64, Ordering::Relaxed);
        self.pushes_failed
            .fetch_add(outcome.failed_count as u64, Ordering::Relaxed);
        self.entries_logged
            .fetch_add(outcome.logged_count as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pushes_sent: self.pushes_sent.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
            entries_logged: self.entries_logged.load(Ordering::Relaxed),
        }
    }
}

/// Routes record events to their notification flow.
///
/// Holds no per-invocation state; any number of `dispatch` calls may run
/// concurrently.
pub struct EventDispatcher {
    records: Arc<dyn RecordStore>,
    resolver: RecipientResolver,
    fanout: DeliveryFanout,
    log_writer: NotificationLogWriter,
    stale_tokens: Option<Arc<dyn StaleTokenHandler>>,
    stats: DispatcherStats,
}

impl EventDispatcher {
    pub fn new(
        records: Arc<dyn RecordStore>,
        fanout: DeliveryFanout,
        log_writer: NotificationLogWriter,
    ) -> Self {
        Self {
            resolver: RecipientResolver::new(records.clone()),
            records,
            fanout,
            log_writer,
            stale_tokens: None,
            stats: DispatcherStats::default(),
        }
    }

    /// Install a handler for addresses the push channel rejected
    pub fn with_stale_token_handler(mut self, handler: Arc<dyn StaleTokenHandler>) -> Self {
        self.stale_tokens = Some(handler);
        self
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn push_channel_name(&self) -> &'static str {
        self.fanout.channel_name()
    }

    /// Handle one record event and report what happened
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, event),
        fields(event = %event.label(), record_id = %event.record_id())
    )]
    pub async fn dispatch(&self, event: &Event) -> InvocationOutcome {
        InvocationMetrics::record_event(event.kind().as_str());

        let outcome = match event {
            Event::RecordCreated {
                kind: RecordKind::Users,
                record_id,
                record,
            } => self.provider_registered(record_id, record).await,
            Event::RecordUpdated {
                kind: RecordKind::Users,
                record_id,
                before,
                after,
            } => self.provider_status_changed(record_id, before, after).await,
            Event::RecordCreated {
                kind: RecordKind::Applications,
                record_id,
                record,
            } => self.application_submitted(record_id, record).await,
            _ => InvocationOutcome::skipped(SkipReason::UnhandledEvent),
        };

        if !outcome.success() {
            InvocationMetrics::record_failure();
            for error in &outcome.errors {
                tracing::warn!(code = error.code(), error = %error, "Invocation failed");
            }
        } else if let Some(reason) = outcome.skipped {
            InvocationMetrics::record_skipped();
            tracing::debug!(reason = ?reason, "Invocation skipped");
        } else {
            InvocationMetrics::record_success();
        }
        self.stats.record(&outcome);

        let span = tracing::Span::current();
        for attr in [
            attributes::event_label(&event.label()),
            attributes::record_id(event.record_id()),
            attributes::push_channel(self.fanout.channel_name()),
            attributes::delivered_count(outcome.sent_count),
            attributes::failed_count(outcome.failed_count),
        ] {
            span.set_attribute(attr.key, attr.value);
        }

        outcome
    }

    /// New job provider: notify every admin with a push token
    async fn provider_registered(&self, provider_id: &str, record: &RecordSnapshot) -> InvocationOutcome {
        if record.str_field("role") != Some(PROVIDER_ROLE) {
            return InvocationOutcome::skipped(SkipReason::NotJobProvider);
        }

        let admins = match self
            .resolver
            .resolve(&RecipientCriteria::Role(ADMIN_ROLE.to_string()))
            .await
        {
            Ok(admins) => admins,
            Err(e) => {
                return InvocationOutcome::failed(InvocationError::RecipientQueryFailure(format!(
                    "Failed to query admin accounts: {}",
                    e
                )))
            }
        };

        let targets = push_targets(&admins);
        if targets.is_empty() {
            tracing::info!(admin_count = admins.len(), "No admin push tokens, skipping");
            return InvocationOutcome::skipped(SkipReason::NoRecipients);
        }

        let mut fields = NotificationFields::new();
        fields.insert("providerId".into(), provider_id.to_string());
        insert_opt(&mut fields, "providerName", record.full_name("firstName", "lastName"));
        insert_opt(&mut fields, "email", record.str_field("email").map(str::to_string));
        insert_opt(&mut fields, "companyName", record.str_field("companyName").map(str::to_string));

        let notification = compose(NotificationKind::NewProvider, &fields);
        self.deliver_and_log(&notification, &targets).await
    }

    /// Provider status change: notify the provider
    async fn provider_status_changed(
        &self,
        provider_id: &str,
        before: &RecordSnapshot,
        after: &RecordSnapshot,
    ) -> InvocationOutcome {
        if after.str_field("role") != Some(PROVIDER_ROLE) {
            return InvocationOutcome::skipped(SkipReason::NotJobProvider);
        }

        let old_status = before.str_field("providerStatus");
        let new_status = after.str_field("providerStatus");
        if old_status == new_status {
            return InvocationOutcome::skipped(SkipReason::StatusUnchanged);
        }

        let Some(notification) = map_transition(RecordKind::Users, old_status, new_status, after) else {
            return InvocationOutcome::skipped(SkipReason::UnrecognizedStatus);
        };

        tracing::info!(
            old_status = old_status.unwrap_or("none"),
            new_status = new_status.unwrap_or("none"),
            "Provider status changed"
        );

        let provider = Recipient::new(provider_id, after.str_field("fcmToken").map(str::to_string));
        self.deliver_and_log(&notification, &[provider]).await
    }

    /// New application: notify the provider who owns the job
    async fn application_submitted(
        &self,
        application_id: &str,
        record: &RecordSnapshot,
    ) -> InvocationOutcome {
        let Some(job_id) = record.str_field("jobId") else {
            return InvocationOutcome::failed(InvocationError::RelatedRecordNotFound(format!(
                "Application {} references no job",
                application_id
            )));
        };

        let job = match self.records.job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                return InvocationOutcome::failed(InvocationError::RelatedRecordNotFound(format!(
                    "Job {} not found",
                    job_id
                )))
            }
            Err(e) => {
                return InvocationOutcome::failed(InvocationError::RecipientQueryFailure(format!(
                    "Failed to load job {}: {}",
                    job_id, e
                )))
            }
        };

        let provider = match self
            .resolver
            .resolve(&RecipientCriteria::Account(job.provider_id.clone()))
            .await
        {
            Ok(found) if !found.is_empty() => found,
            Ok(_) => {
                return InvocationOutcome::failed(InvocationError::RelatedRecordNotFound(format!(
                    "Provider {} of job {} not found",
                    job.provider_id, job_id
                )))
            }
            Err(e) => {
                return InvocationOutcome::failed(InvocationError::RecipientQueryFailure(format!(
                    "Failed to load provider {}: {}",
                    job.provider_id, e
                )))
            }
        };

        let applicant = record
            .str_field("applicantName")
            .map(str::to_string)
            .or_else(|| record.full_name("firstName", "lastName"));

        let mut fields = NotificationFields::new();
        fields.insert("applicationId".into(), application_id.to_string());
        fields.insert("jobId".into(), job_id.to_string());
        insert_opt(&mut fields, "applicantId", record.str_field("seekerId").map(str::to_string));
        insert_opt(&mut fields, "applicantName", applicant);
        insert_opt(&mut fields, "jobTitle", job.title.clone());

        let notification = compose(NotificationKind::NewApplication, &fields);
        self.deliver_and_log(&notification, &provider).await
    }

    /// Push and log concurrently; neither cancels the other
    async fn deliver_and_log(&self, notification: &Notification, recipients: &[Recipient]) -> InvocationOutcome {
        let (report, logged) = tokio::join!(
            self.fanout.deliver(notification, recipients),
            self.log_writer.persist(recipients, notification),
        );

        let mut outcome = InvocationOutcome {
            sent_count: report.delivered_count(),
            failed_count: report.failed_count(),
            ..Default::default()
        };

        match report.channel_error {
            Some(e) => outcome
                .errors
                .push(InvocationError::ChannelCallFailure(e.to_string())),
            // A transport failure says nothing about the tokens themselves
            None => outcome.invalid_addresses = report_invalid(&report.outcomes),
        }

        match logged {
            Ok(count) => outcome.logged_count = count,
            Err(e) => outcome
                .errors
                .push(InvocationError::BatchCommitFailure(e.to_string())),
        }

        if !outcome.invalid_addresses.is_empty() {
            tracing::warn!(
                count = outcome.invalid_addresses.len(),
                "Push addresses failed and should be invalidated"
            );
            if let Some(handler) = &self.stale_tokens {
                if let Err(e) = handler.invalidate(&outcome.invalid_addresses).await {
                    tracing::warn!(error = %e, "Stale token handler failed");
                }
            }
        }

        outcome
    }
}

fn insert_opt(fields: &mut NotificationFields, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::DryRunChannel;
    use crate::store::{MemoryLogStore, MemoryRecordStore};
    use serde_json::json;

    fn dispatcher() -> EventDispatcher {
        let records = Arc::new(MemoryRecordStore::new());
        EventDispatcher::new(
            records,
            DeliveryFanout::new(Arc::new(DryRunChannel::new())),
            NotificationLogWriter::new(Arc::new(MemoryLogStore::new())),
        )
    }

    #[test]
    fn test_outcome_serialization() {
        let mut outcome = InvocationOutcome::failed(InvocationError::RelatedRecordNotFound(
            "Job j-1 not found".into(),
        ));
        outcome
            .errors
            .push(InvocationError::BatchCommitFailure("down".into()));

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["sent_count"], 0);
        assert_eq!(value["error"], "RelatedRecordNotFound");
        assert_eq!(value["errors"][1]["code"], "BatchCommitFailure");
        assert_eq!(value["errors"][0]["message"], "Job j-1 not found");

        let skipped = serde_json::to_value(InvocationOutcome::skipped(SkipReason::NoRecipients)).unwrap();
        assert_eq!(skipped["success"], true);
        assert_eq!(skipped["skipped"], "no_recipients");
        assert!(skipped["error"].is_null());
    }

    #[tokio::test]
    async fn test_unhandled_events_are_skipped() {
        let dispatcher = dispatcher();

        let job_created = Event::created(RecordKind::Jobs, "j-1", RecordSnapshot::default());
        let outcome = dispatcher.dispatch(&job_created).await;
        assert!(outcome.success());
        assert_eq!(outcome.skipped, Some(SkipReason::UnhandledEvent));

        let app_updated = Event::updated(
            RecordKind::Applications,
            "a-1",
            RecordSnapshot::default(),
            RecordSnapshot::default(),
        );
        assert_eq!(
            dispatcher.dispatch(&app_updated).await.skipped,
            Some(SkipReason::UnhandledEvent)
        );

        assert_eq!(dispatcher.stats().skipped, 2);
    }

    #[tokio::test]
    async fn test_seeker_registration_is_skipped() {
        let event = Event::created(
            RecordKind::Users,
            "u-1",
            RecordSnapshot::from(json!({ "role": "job_seeker" })),
        );
        let outcome = dispatcher().dispatch(&event).await;
        assert_eq!(outcome.skipped, Some(SkipReason::NotJobProvider));
    }

    #[tokio::test]
    async fn test_missing_job_id_is_related_record_failure() {
        let event = Event::created(
            RecordKind::Applications,
            "a-1",
            RecordSnapshot::from(json!({ "seekerId": "s-1" })),
        );
        let outcome = dispatcher().dispatch(&event).await;
        assert!(!outcome.success());
        assert_eq!(outcome.error().unwrap().code(), "RelatedRecordNotFound");
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_skipped() {
        let event = Event::updated(
            RecordKind::Users,
            "p-1",
            RecordSnapshot::from(json!({ "role": "job_provider", "providerStatus": "pending" })),
            RecordSnapshot::from(json!({ "role": "job_provider", "providerStatus": "archived" })),
        );
        let outcome = dispatcher().dispatch(&event).await;
        assert_eq!(outcome.skipped, Some(SkipReason::UnrecognizedStatus));
    }
}
