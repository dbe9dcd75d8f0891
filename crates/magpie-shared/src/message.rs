use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConversationKey, Handle, MessageId};

/// Message content. Exactly one kind per message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MessageBody {
    /// Plain text.
    Text { text: String },

    /// Reference to an attachment. The URL is minted by the sending session
    /// (an object URL scoped to that session) and stops resolving once the
    /// session ends; the reference itself still delivers.
    #[serde(rename_all = "camelCase")]
    Attachment { url: String, mime_type: String },
}

impl MessageBody {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Attachment { .. } => None,
        }
    }

    /// Short human-readable form for sidebars and notifications.
    pub fn preview(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Attachment { mime_type, .. } => format!("[attachment: {}]", mime_type),
        }
    }
}

/// A message as stored and delivered by the channel backend.
///
/// The identifier and creation time are server-assigned. The only field that
/// ever changes after acceptance is `read`, and only from `false` to `true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation: ConversationKey,
    pub sender: Handle,
    pub recipient: Handle,
    pub body: MessageBody,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// True when this delivered message carries the same sender, recipient
    /// and body as a locally drafted one. Used to recognise a provisional
    /// message coming back through a snapshot before its append receipt.
    pub fn matches_draft(&self, draft: &MessageDraft) -> bool {
        self.sender == draft.sender
            && self.recipient == draft.recipient
            && self.body == draft.body
    }
}

/// Client-composed message submitted to the channel for durable append.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub sender: Handle,
    pub recipient: Handle,
    pub body: MessageBody,
}

/// Server acknowledgement for an accepted append.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppendReceipt {
    pub id: MessageId,
    pub sent_at: DateTime<Utc>,
}
