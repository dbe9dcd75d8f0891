//! Events emitted by [`ChatClient`](crate::chat::ChatClient) for the
//! embedding UI.

use serde::Serialize;

use magpie_shared::{ConversationKey, Handle, LocalMessageId};

/// State-change notifications, delivered over a `tokio::sync::broadcast`
/// channel. A receiver that lags behind misses intermediate events only;
/// client state queries always expose the current picture.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// The open conversation changed: a snapshot was applied, a message was
    /// inserted, or a delivery state moved.
    ConversationUpdated { key: ConversationKey },

    /// An append failed; the entry stays in the timeline as retryable.
    #[serde(rename_all = "camelCase")]
    MessageFailed {
        local_id: LocalMessageId,
        reason: String,
    },

    /// A peer's unread count changed.
    UnreadChanged { peer: Handle, count: usize },

    /// A live feed ended. The conversation must be reopened to resubscribe.
    SubscriptionLost { key: ConversationKey },
}
