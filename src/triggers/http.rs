//! HTTP event ingestion.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::events::Event;
use crate::notification::InvocationOutcome;
use crate::server::AppState;

/// Most events accepted by one batch request
const MAX_BATCH_SIZE: usize = 100;

/// Dispatch a single record event and return its outcome.
///
/// A related-record or channel failure is still a 200: the outcome body
/// carries `success: false` and the error codes.
#[tracing::instrument(
    name = "http.ingest_event",
    skip(state, event),
    fields(event = %event.label(), record_id = %event.record_id())
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> Result<Json<InvocationOutcome>> {
    Ok(Json(state.dispatcher.dispatch(&event).await))
}

/// Response for a batch of events
#[derive(Debug, Serialize)]
pub struct BatchIngestResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<InvocationOutcome>,
}

/// Dispatch several events, in order. Each event is independent.
#[tracing::instrument(name = "http.ingest_events", skip(state, events), fields(count = events.len()))]
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> Result<Json<BatchIngestResponse>> {
    if events.is_empty() {
        return Err(AppError::Validation("Batch contains no events".into()));
    }
    if events.len() > MAX_BATCH_SIZE {
        return Err(AppError::Validation(format!(
            "Batch size {} exceeds maximum of {}",
            events.len(),
            MAX_BATCH_SIZE
        )));
    }

    let mut outcomes = Vec::with_capacity(events.len());
    for event in &events {
        outcomes.push(state.dispatcher.dispatch(event).await);
    }

    let succeeded = outcomes.iter().filter(|o| o.success()).count();
    Ok(Json(BatchIngestResponse {
        total: outcomes.len(),
        succeeded,
        failed: outcomes.len() - succeeded,
        outcomes,
    }))
}
