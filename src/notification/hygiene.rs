//! Token hygiene: which push addresses should be invalidated.
//!
//! Reporting is a pure filter. Acting on the report (clearing stale tokens
//! from accounts) is left to a `StaleTokenHandler`, which the dispatcher
//! only calls when one is installed.

use async_trait::async_trait;

use crate::metrics::PushMetrics;
use crate::store::RecordStoreError;

use super::DeliveryOutcome;

/// Addresses whose delivery failed, in outcome order
pub fn report_invalid(outcomes: &[DeliveryOutcome]) -> Vec<String> {
    let invalid: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| o.address.clone())
        .collect();

    for outcome in outcomes.iter().filter(|o| !o.success) {
        tracing::debug!(
            recipient_id = %outcome.recipient_id,
            reason = outcome.error_reason.as_deref().unwrap_or("unknown"),
            "Push address failed"
        );
    }
    if !invalid.is_empty() {
        PushMetrics::record_invalid_tokens(invalid.len() as u64);
    }

    invalid
}

/// Acts on addresses reported invalid, e.g. by clearing them from accounts
#[async_trait]
pub trait StaleTokenHandler: Send + Sync {
    async fn invalidate(&self, addresses: &[String]) -> Result<(), RecordStoreError>;
}
