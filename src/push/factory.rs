use std::sync::Arc;

use crate::config::PushConfig;

use super::{DryRunChannel, FcmChannel, PushChannel, PushChannelError};

/// Create the push channel based on configuration.
///
/// - `enabled = true`: FCM HTTP v1 channel
/// - `enabled = false` (default): dry-run channel
pub fn create_push_channel(settings: &PushConfig) -> Result<Arc<dyn PushChannel>, PushChannelError> {
    if !settings.enabled {
        tracing::info!(channel = "dry_run", "Push delivery disabled, using dry-run channel");
        return Ok(Arc::new(DryRunChannel::new()));
    }

    if settings.project_id.is_empty() || settings.access_token.is_empty() {
        tracing::warn!(
            "Push delivery enabled without project_id or access_token, multicast calls will fail"
        );
    }

    tracing::info!(
        channel = "fcm",
        endpoint = %settings.endpoint,
        project_id = %settings.project_id,
        max_concurrency = settings.max_concurrency,
        "Creating FCM push channel"
    );
    Ok(Arc::new(FcmChannel::new(settings)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_uses_dry_run() {
        let channel = create_push_channel(&PushConfig::default()).unwrap();
        assert_eq!(channel.name(), "dry_run");
    }

    #[test]
    fn test_enabled_uses_fcm() {
        let config = PushConfig {
            enabled: true,
            project_id: "demo".into(),
            access_token: "token".into(),
            ..Default::default()
        };
        let channel = create_push_channel(&config).unwrap();
        assert_eq!(channel.name(), "fcm");
    }
}
