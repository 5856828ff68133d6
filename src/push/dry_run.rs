use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::notification::PushMessage;

use super::{PushChannel, PushChannelError, PushResponse, MAX_MULTICAST_ADDRESSES};

/// Channel used when push delivery is disabled.
///
/// Accepts every address and logs what would have been sent.
#[derive(Debug, Default)]
pub struct DryRunChannel {
    sent: AtomicU64,
}

impl DryRunChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses accepted since startup
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PushChannel for DryRunChannel {
    async fn send_multicast(
        &self,
        message: &PushMessage,
        addresses: &[String],
    ) -> Result<Vec<PushResponse>, PushChannelError> {
        if addresses.len() > MAX_MULTICAST_ADDRESSES {
            return Err(PushChannelError::TooManyAddresses(addresses.len()));
        }

        tracing::info!(
            title = %message.title,
            address_count = addresses.len(),
            "Push disabled, not sending multicast"
        );

        let start = self.sent.fetch_add(addresses.len() as u64, Ordering::Relaxed);
        Ok((0..addresses.len() as u64)
            .map(|i| PushResponse::sent(format!("dry-run-{}", start + i)))
            .collect())
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}
