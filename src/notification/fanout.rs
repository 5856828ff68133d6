use std::sync::Arc;
use std::time::Instant;

use crate::metrics::PushMetrics;
use crate::push::{PushChannel, PushChannelError};

use super::{DeliveryOutcome, Notification, PushMessage, Recipient};

/// Result of one fan-out: per-address outcomes plus the call-level error,
/// if the channel call failed as a whole.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub outcomes: Vec<DeliveryOutcome>,
    pub channel_error: Option<PushChannelError>,
}

impl FanoutReport {
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn is_call_failure(&self) -> bool {
        self.channel_error.is_some()
    }
}

/// Delivery fan-out engine.
///
/// Sends one notification to every addressed recipient in a single
/// multicast call. Does not retry.
pub struct DeliveryFanout {
    channel: Arc<dyn PushChannel>,
    click_action: Option<String>,
}

impl DeliveryFanout {
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self {
            channel,
            click_action: None,
        }
    }

    /// Add a `click_action` data key to every push payload
    pub fn with_click_action(mut self, click_action: impl Into<String>) -> Self {
        self.click_action = Some(click_action.into()).filter(|a| !a.is_empty());
        self
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    /// Push `notification` to every recipient that has an address.
    ///
    /// Outcomes follow recipient order. With no addressed recipients the
    /// channel is not called.
    #[tracing::instrument(
        name = "fanout.deliver",
        skip(self, notification, recipients),
        fields(kind = %notification.kind().as_str(), recipient_count = recipients.len())
    )]
    pub async fn deliver(&self, notification: &Notification, recipients: &[Recipient]) -> FanoutReport {
        let targets: Vec<(&str, &str)> = recipients
            .iter()
            .filter_map(|r| r.address.as_deref().map(|a| (r.id.as_str(), a)))
            .collect();

        if targets.is_empty() {
            tracing::debug!("No push addresses, skipping multicast");
            return FanoutReport::default();
        }

        let message = PushMessage::from_notification(notification, self.click_action.as_deref());
        let addresses: Vec<String> = targets.iter().map(|(_, a)| a.to_string()).collect();

        let started = Instant::now();
        let result = self.channel.send_multicast(&message, &addresses).await;
        PushMetrics::record_latency_ms(started.elapsed().as_millis() as u64);

        let report = match result {
            Ok(responses) => {
                if responses.len() != targets.len() {
                    tracing::warn!(
                        expected = targets.len(),
                        received = responses.len(),
                        "Push channel returned a mismatched response count"
                    );
                }

                let outcomes = targets
                    .iter()
                    .enumerate()
                    .map(|(idx, (recipient_id, address))| match responses.get(idx) {
                        Some(r) if r.success => DeliveryOutcome::delivered(*recipient_id, *address),
                        Some(r) => DeliveryOutcome::failed(
                            *recipient_id,
                            *address,
                            r.error.clone().unwrap_or_else(|| "rejected".to_string()),
                        ),
                        None => DeliveryOutcome::failed(
                            *recipient_id,
                            *address,
                            "no response from push channel",
                        ),
                    })
                    .collect();

                FanoutReport {
                    outcomes,
                    channel_error: None,
                }
            }
            Err(e) => {
                PushMetrics::record_call_failure();
                tracing::error!(
                    channel = self.channel.name(),
                    error = %e,
                    address_count = targets.len(),
                    "Multicast push call failed"
                );

                let reason = e.to_string();
                FanoutReport {
                    outcomes: targets
                        .iter()
                        .map(|(recipient_id, address)| {
                            DeliveryOutcome::failed(*recipient_id, *address, reason.clone())
                        })
                        .collect(),
                    channel_error: Some(e),
                }
            }
        };

        let delivered = report.delivered_count();
        let failed = report.failed_count();
        PushMetrics::record_outcomes(delivered as u64, failed as u64);
        tracing::info!(delivered = delivered, failed = failed, "Multicast push completed");

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationKind;
    use crate::push::PushResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Rejects listed addresses, records every call
    #[derive(Default)]
    struct ScriptedChannel {
        reject: Vec<&'static str>,
        fail_call: bool,
        calls: Mutex<Vec<(PushMessage, Vec<String>)>>,
    }

    #[async_trait]
    impl PushChannel for ScriptedChannel {
        async fn send_multicast(
            &self,
            message: &PushMessage,
            addresses: &[String],
        ) -> Result<Vec<PushResponse>, PushChannelError> {
            self.calls
                .lock()
                .unwrap()
                .push((message.clone(), addresses.to_vec()));
            if self.fail_call {
                return Err(PushChannelError::Transport("connection refused".into()));
            }
            Ok(addresses
                .iter()
                .map(|a| {
                    if self.reject.contains(&a.as_str()) {
                        PushResponse::rejected("UNREGISTERED")
                    } else {
                        PushResponse::sent(format!("msg-{}", a))
                    }
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn notification() -> Notification {
        Notification::builder(NotificationKind::NewProvider, "t", "b").build()
    }

    fn recipients() -> Vec<Recipient> {
        vec![
            Recipient::new("a", Some("tok-a".into())),
            Recipient::new("b", None),
            Recipient::new("c", Some("tok-c".into())),
        ]
    }

    #[tokio::test]
    async fn test_no_addresses_skips_channel() {
        let channel = Arc::new(ScriptedChannel::default());
        let fanout = DeliveryFanout::new(channel.clone());

        let report = fanout
            .deliver(&notification(), &[Recipient::new("a", None)])
            .await;
        assert!(report.outcomes.is_empty());
        assert!(channel.calls.lock().unwrap().is_empty());

        let report = fanout.deliver(&notification(), &[]).await;
        assert!(report.outcomes.is_empty());
        assert!(channel.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_multicast_with_partial_failure() {
        let channel = Arc::new(ScriptedChannel {
            reject: vec!["tok-c"],
            ..Default::default()
        });
        let fanout = DeliveryFanout::new(channel.clone()).with_click_action("OPEN");

        let report = fanout.deliver(&notification(), &recipients()).await;

        let calls = channel.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec!["tok-a".to_string(), "tok-c".to_string()]);
        assert_eq!(calls[0].0.data["click_action"], "OPEN");

        assert!(!report.is_call_failure());
        assert_eq!(report.delivered_count(), 1);
        assert_eq!(report.outcomes[1].recipient_id, "c");
        assert_eq!(report.outcomes[1].error_reason.as_deref(), Some("UNREGISTERED"));
    }

    #[tokio::test]
    async fn test_call_failure_marks_every_address() {
        let channel = Arc::new(ScriptedChannel {
            fail_call: true,
            ..Default::default()
        });
        let fanout = DeliveryFanout::new(channel);

        let report = fanout.deliver(&notification(), &recipients()).await;

        assert!(report.is_call_failure());
        assert_eq!(report.failed_count(), 2);
        let reasons: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.error_reason.clone().unwrap())
            .collect();
        assert_eq!(reasons[0], reasons[1]);
        assert!(reasons[0].contains("connection refused"));
    }
}
