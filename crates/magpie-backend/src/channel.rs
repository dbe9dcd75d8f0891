//! Message channel seam.

use async_trait::async_trait;

use magpie_shared::{
    AppendReceipt, ChannelError, ConversationKey, Handle, Message, MessageDraft, MessageId,
};

use crate::subscription::Subscription;

/// Durable, realtime message backend.
///
/// The channel owns message persistence and ordering. Every feed delivery is
/// the *full current state* of the watched set, never a delta; consumers
/// replace their view wholesale on each one.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Live feed of one conversation's messages.
    async fn subscribe(
        &self,
        key: &ConversationKey,
    ) -> Result<Subscription<Vec<Message>>, ChannelError>;

    /// Durably append a draft. The backend assigns the message identifier
    /// and the authoritative creation time.
    async fn append(
        &self,
        key: &ConversationKey,
        draft: MessageDraft,
    ) -> Result<AppendReceipt, ChannelError>;

    /// Flip the read flag on the given messages. Batchable and idempotent;
    /// the flag only ever goes from unread to read.
    async fn mark_read(
        &self,
        key: &ConversationKey,
        ids: &[MessageId],
    ) -> Result<(), ChannelError>;

    /// Live feed of every unread message addressed to `recipient`, across
    /// all conversations. Drives unread counts and sidebar indicators.
    async fn subscribe_unread(
        &self,
        recipient: &Handle,
    ) -> Result<Subscription<Vec<Message>>, ChannelError>;
}
