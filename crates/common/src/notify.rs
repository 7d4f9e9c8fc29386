use async_trait::async_trait;
use tracing::warn;

use crate::Result;

/// Outbound alerting. Shared between the trading worker and the command
/// channel, so implementations must tolerate concurrent `send` calls.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Drops every message. Used when no alert transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Send `message`, logging and discarding any failure.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        warn!(error = %e, "Notification dropped");
    }
}

/// Enable switch exposed by the remote command channel to the control API.
pub trait CommandToggle: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);
}
