use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, Mutex};

use crate::config::RedisConfig;
use crate::events::Event;
use crate::notification::{EventDispatcher, InvocationOutcome};
use crate::redis::ReconnectBackoff;

/// Channel subscribed to when none are configured
pub const DEFAULT_CHANNEL: &str = "fanout:events";

/// Redis Pub/Sub subscriber feeding record events to the dispatcher.
///
/// Each message payload is one JSON `Event`. Malformed payloads are logged
/// and dropped.
pub struct RedisSubscriber {
    config: RedisConfig,
    dispatcher: Arc<EventDispatcher>,
    shutdown: broadcast::Sender<()>,
    /// Subscribed at construction so a signal sent before `start` is kept
    shutdown_rx: Mutex<broadcast::Receiver<()>>,
}

impl RedisSubscriber {
    pub fn new(config: RedisConfig, dispatcher: Arc<EventDispatcher>) -> Self {
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        Self {
            config,
            dispatcher,
            shutdown,
            shutdown_rx: Mutex::new(shutdown_rx),
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Subscribe and dispatch until shutdown, reconnecting with backoff
    pub async fn start(&self) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::info!("Redis trigger disabled, skipping subscriber");
            return Ok(());
        }

        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis subscriber");

        let mut backoff = ReconnectBackoff::new();
        let mut shutdown_rx = self.shutdown_rx.lock().await;

        loop {
            match self
                .run_subscription_loop(&channels, &mut backoff, &mut shutdown_rx)
                .await
            {
                Ok(()) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Shutdown during reconnect backoff");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    async fn connect(&self, channels: &[String]) -> anyhow::Result<::redis::aio::PubSub> {
        let client = ::redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        Ok(pubsub)
    }

    /// Runs until shutdown (`Ok`) or a connection error (`Err`)
    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ReconnectBackoff,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let mut pubsub = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                tracing::info!("Received shutdown signal while connecting");
                return Ok(());
            }
            pubsub = self.connect(channels) => pubsub?,
        };

        tracing::info!("Redis subscription established");
        backoff.reset();

        let mut message_stream = pubsub.on_message();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };
                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, channel = %channel, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    /// Parse and dispatch one message. `None` when the payload is malformed.
    async fn handle_message(&self, channel: &str, payload: &str) -> Option<InvocationOutcome> {
        let event = match parse_event(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    payload = %payload,
                    "Failed to parse Redis event"
                );
                return None;
            }
        };

        let outcome = self.dispatcher.dispatch(&event).await;

        tracing::debug!(
            channel = %channel,
            event = %event.label(),
            success = outcome.success(),
            sent = outcome.sent_count,
            logged = outcome.logged_count,
            "Dispatched event from Redis"
        );

        Some(outcome)
    }
}

fn parse_event(payload: &str) -> Result<Event, serde_json::Error> {
    serde_json::from_str(payload)
}
