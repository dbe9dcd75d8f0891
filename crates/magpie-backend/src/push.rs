//! Push gateway seam.

use async_trait::async_trait;
use tokio::sync::mpsc;

use magpie_shared::{AccountId, PushError, PushNotification, PushToken};

/// Push notification gateway. Strictly informational: message delivery and
/// unread bookkeeping never depend on it.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Register the current device for pushes addressed to `account` and
    /// return its delivery token.
    async fn register_device(&self, account: &AccountId) -> Result<PushToken, PushError>;

    /// Stream of notifications for a registered device. Each token's stream
    /// can be claimed once.
    async fn notifications(
        &self,
        token: &PushToken,
    ) -> Result<mpsc::UnboundedReceiver<PushNotification>, PushError>;
}
