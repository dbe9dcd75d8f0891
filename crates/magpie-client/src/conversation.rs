//! Optimistic timeline for one open conversation.
//!
//! A send renders immediately as a provisional entry under a session-local
//! id and client-observed time. The durable append then either confirms the
//! entry (server id and time take over) or marks it failed and retryable.
//! Snapshot deliveries replace the confirmed section wholesale; provisional
//! entries survive them and render after the confirmed section.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use magpie_shared::{
    AppendReceipt, ConversationKey, Handle, LocalMessageId, Message, MessageBody, MessageDraft,
    MessageId,
};

/// Delivery state of a timeline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted locally, durable append still in flight.
    Pending,

    /// The backend holds the message.
    Confirmed,

    /// The append failed. The entry stays visible and can be retried under
    /// the same local id, or discarded.
    Failed { reason: String },
}

/// A message as rendered in the open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewMessage {
    /// Session-local identity, stable across `Pending` -> `Confirmed`.
    pub local_id: LocalMessageId,
    /// Server identity, known once confirmed.
    pub server_id: Option<MessageId>,
    pub sender: Handle,
    pub recipient: Handle,
    pub body: MessageBody,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
    pub delivery: Delivery,
}

impl ViewMessage {
    /// The wire draft equivalent of this entry.
    pub fn as_draft(&self) -> MessageDraft {
        MessageDraft {
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            body: self.body.clone(),
        }
    }
}

/// Timeline state for one conversation.
pub struct ConversationView {
    key: ConversationKey,
    me: Handle,
    peer: Handle,
    /// Confirmed section, sorted by server time (ties by server id).
    confirmed: Vec<ViewMessage>,
    /// Provisional sends (pending or failed), insertion order.
    outgoing: Vec<ViewMessage>,
    /// Local ids the server has accepted, so a receipt and a snapshot for
    /// the same send reconcile to one entry whichever lands first.
    accepted: HashMap<LocalMessageId, MessageId>,
    /// Ids whose read flag was observed or flipped. Monotonic: a later
    /// snapshot cannot clear it.
    read_ids: HashSet<MessageId>,
}

impl ConversationView {
    pub fn new(me: Handle, peer: Handle) -> Self {
        Self {
            key: ConversationKey::between(&me, &peer),
            me,
            peer,
            confirmed: Vec::new(),
            outgoing: Vec::new(),
            accepted: HashMap::new(),
            read_ids: HashSet::new(),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn peer(&self) -> &Handle {
        &self.peer
    }

    /// Timeline in render order: the confirmed section, then provisional
    /// entries. Provisional client times are never interleaved with server
    /// times.
    pub fn messages(&self) -> impl Iterator<Item = &ViewMessage> {
        self.confirmed.iter().chain(self.outgoing.iter())
    }

    // ------------------------------------------------------------------
    // Optimistic send
    // ------------------------------------------------------------------

    /// Insert a provisional entry for `draft` and return its local id.
    ///
    /// The caller issues the durable append and reports the outcome through
    /// [`apply_send_ack`](Self::apply_send_ack) or
    /// [`apply_send_failure`](Self::apply_send_failure).
    pub fn begin_send(&mut self, draft: MessageDraft) -> LocalMessageId {
        let local_id = LocalMessageId::new();
        self.outgoing.push(ViewMessage {
            local_id,
            server_id: None,
            sender: draft.sender,
            recipient: draft.recipient,
            body: draft.body,
            sent_at: Utc::now(),
            read: false,
            delivery: Delivery::Pending,
        });
        local_id
    }

    /// Reconcile an append receipt with its provisional entry, located by
    /// local id only. A receipt for an entry a snapshot already claimed, or
    /// for one discarded meanwhile, is a no-op.
    pub fn apply_send_ack(&mut self, local_id: LocalMessageId, receipt: &AppendReceipt) {
        if self.accepted.contains_key(&local_id) {
            debug!(local = %local_id, server = %receipt.id, "Receipt for already-reconciled entry");
            return;
        }

        let position = match self.outgoing.iter().position(|m| m.local_id == local_id) {
            Some(p) => p,
            None => {
                debug!(local = %local_id, "Receipt for unknown entry");
                return;
            }
        };

        let mut entry = self.outgoing.remove(position);
        entry.server_id = Some(receipt.id.clone());
        entry.sent_at = receipt.sent_at;
        entry.delivery = Delivery::Confirmed;

        self.accepted.insert(local_id, receipt.id.clone());
        self.confirmed.push(entry);
        sort_by_server_order(&mut self.confirmed);
    }

    /// Mark a still-pending entry failed. Confirmed and unknown entries are
    /// left alone.
    pub fn apply_send_failure(&mut self, local_id: LocalMessageId, reason: String) {
        if let Some(entry) = self
            .outgoing
            .iter_mut()
            .find(|m| m.local_id == local_id && m.delivery == Delivery::Pending)
        {
            entry.delivery = Delivery::Failed { reason };
        }
    }

    /// Re-arm a failed entry for another append attempt, keeping its local
    /// id so a success cannot duplicate it. Returns the draft to re-send.
    pub fn retry(&mut self, local_id: LocalMessageId) -> Option<MessageDraft> {
        let entry = self
            .outgoing
            .iter_mut()
            .find(|m| m.local_id == local_id && matches!(m.delivery, Delivery::Failed { .. }))?;
        entry.delivery = Delivery::Pending;
        entry.sent_at = Utc::now();
        Some(entry.as_draft())
    }

    /// Drop a failed entry from the timeline. Pending and confirmed entries
    /// cannot be discarded.
    pub fn discard(&mut self, local_id: LocalMessageId) -> bool {
        let before = self.outgoing.len();
        self.outgoing
            .retain(|m| !(m.local_id == local_id && matches!(m.delivery, Delivery::Failed { .. })));
        self.outgoing.len() < before
    }

    // ------------------------------------------------------------------
    // Snapshot application
    // ------------------------------------------------------------------

    /// Replace the confirmed section with an authoritative snapshot.
    ///
    /// Entries keep their local identity: a snapshot message whose server id
    /// is already known reuses the existing local id, and one matching a
    /// still-pending send's sender/recipient/body claims that send, so the
    /// direct receipt arriving later reconciles to the same single entry.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Message>) {
        let known: HashMap<MessageId, LocalMessageId> = self
            .confirmed
            .iter()
            .filter_map(|m| m.server_id.clone().map(|id| (id, m.local_id)))
            .collect();

        let mut next = Vec::with_capacity(snapshot.len());
        for message in snapshot {
            if message.read {
                self.read_ids.insert(message.id.clone());
            }

            let local_id = match known.get(&message.id) {
                Some(existing) => *existing,
                None => match self.claim_pending(&message) {
                    Some(claimed) => claimed,
                    None => LocalMessageId::new(),
                },
            };

            let read = self.read_ids.contains(&message.id);
            next.push(ViewMessage {
                local_id,
                server_id: Some(message.id),
                sender: message.sender,
                recipient: message.recipient,
                body: message.body,
                sent_at: message.sent_at,
                read,
                delivery: Delivery::Confirmed,
            });
        }

        sort_by_server_order(&mut next);
        self.confirmed = next;
    }

    /// Claim the oldest pending entry matching a snapshot message we sent,
    /// so the optimistic copy and the server copy never render twice.
    fn claim_pending(&mut self, message: &Message) -> Option<LocalMessageId> {
        if message.sender != self.me {
            return None;
        }
        let position = self.outgoing.iter().position(|entry| {
            entry.delivery == Delivery::Pending && message.matches_draft(&entry.as_draft())
        })?;

        let entry = self.outgoing.remove(position);
        self.accepted.insert(entry.local_id, message.id.clone());
        debug!(local = %entry.local_id, server = %message.id, "Snapshot claimed pending send");
        Some(entry.local_id)
    }

    // ------------------------------------------------------------------
    // Read flags
    // ------------------------------------------------------------------

    /// Record ids as read. The flag is monotonic in this view: later
    /// snapshots cannot clear it.
    pub fn note_read(&mut self, ids: &[MessageId]) {
        for id in ids {
            self.read_ids.insert(id.clone());
        }
        for entry in &mut self.confirmed {
            match entry.server_id {
                Some(ref id) if self.read_ids.contains(id) => entry.read = true,
                _ => {}
            }
        }
    }

    /// Server ids addressed to us that are still unread, for the batch
    /// read-flag flip when the conversation opens.
    pub fn unread_ids(&self) -> Vec<MessageId> {
        self.confirmed
            .iter()
            .filter(|m| m.recipient == self.me && !m.read)
            .filter_map(|m| m.server_id.clone())
            .collect()
    }
}

fn sort_by_server_order(messages: &mut [ViewMessage]) {
    messages.sort_by(|a, b| {
        a.sent_at
            .cmp(&b.sent_at)
            .then_with(|| a.server_id.cmp(&b.server_id))
    });
}
