//! Unread bookkeeping across all conversations.

use std::collections::HashMap;

use magpie_shared::{Handle, Message, MessageId};

/// Per-peer unread counts derived from the unread feed.
///
/// Rebuilt wholesale from every feed snapshot. Message ids are retained so
/// the batch read-flag flip can be issued when a conversation opens; a
/// crash between the local zeroing and the durable flip loses nothing,
/// because the next snapshot rebuilds the ledger from channel state.
#[derive(Debug)]
pub struct UnreadLedger {
    me: Handle,
    per_peer: HashMap<Handle, Vec<MessageId>>,
}

impl UnreadLedger {
    pub fn new(me: Handle) -> Self {
        Self {
            me,
            per_peer: HashMap::new(),
        }
    }

    /// Rebuild counts from a full unread-feed snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &[Message]) {
        let mut next: HashMap<Handle, Vec<MessageId>> = HashMap::new();
        for message in snapshot {
            if message.read || message.recipient != self.me {
                continue;
            }
            next.entry(message.sender.clone())
                .or_default()
                .push(message.id.clone());
        }
        self.per_peer = next;
    }

    /// Unread count from one peer.
    pub fn count_for(&self, peer: &Handle) -> usize {
        self.per_peer.get(peer).map(Vec::len).unwrap_or(0)
    }

    /// Whether the sidebar shows a dot for this peer.
    pub fn has_unread(&self, peer: &Handle) -> bool {
        self.count_for(peer) > 0
    }

    /// Total unread across all peers. Zero exactly when no peer has any.
    pub fn total(&self) -> usize {
        self.per_peer.values().map(Vec::len).sum()
    }

    /// Snapshot of all per-peer counts.
    pub fn counts(&self) -> HashMap<Handle, usize> {
        self.per_peer
            .iter()
            .map(|(peer, ids)| (peer.clone(), ids.len()))
            .collect()
    }

    /// Zero a peer's count and take the ids for the durable read-flag flip.
    pub fn clear_peer(&mut self, peer: &Handle) -> Vec<MessageId> {
        self.per_peer.remove(peer).unwrap_or_default()
    }
}
