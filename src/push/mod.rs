//! Push notification channel.
//!
//! The fan-out engine talks to the push provider through `PushChannel`: one
//! multicast call per notification carrying every delivery address. A
//! channel returns either a per-address response list (same order as the
//! addresses) or a single call-level error.
//!
//! - `FcmChannel`: Firebase Cloud Messaging HTTP v1 over reqwest
//! - `DryRunChannel`: logs and accepts every address (push disabled)

mod dry_run;
mod factory;
mod fcm;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::notification::PushMessage;

pub use dry_run::DryRunChannel;
pub use factory::create_push_channel;
pub use fcm::FcmChannel;

/// Most addresses a single multicast call may carry
pub const MAX_MULTICAST_ADDRESSES: usize = 500;

/// Errors that fail a multicast call as a whole
#[derive(Debug, Error)]
pub enum PushChannelError {
    /// Channel is missing credentials or a project
    #[error("Push channel not configured: {0}")]
    NotConfigured(String),

    /// More addresses than one call accepts
    #[error("Too many addresses for one multicast call: {0} (max {MAX_MULTICAST_ADDRESSES})")]
    TooManyAddresses(usize),

    /// Provider unreachable for every address
    #[error("Push transport unavailable: {0}")]
    Transport(String),

    /// Provider refused the call itself (credentials, sender)
    #[error("Push provider rejected the call: {0}")]
    Rejected(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Provider answer for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushResponse {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(reason.into()),
        }
    }
}

/// Multicast push transport.
///
/// Implementations must be thread-safe; one channel is shared by every
/// invocation.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Send one message to many addresses in a single call.
    ///
    /// On success the returned list has one response per address, in
    /// address order.
    async fn send_multicast(
        &self,
        message: &PushMessage,
        addresses: &[String],
    ) -> Result<Vec<PushResponse>, PushChannelError>;

    /// Channel name for logs and health output
    fn name(&self) -> &'static str;
}
