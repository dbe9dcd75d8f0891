//! Caller-driven chat controller.
//!
//! [`ChatClient`] owns the open conversation, the unread ledger and the
//! peer roster. The embedder drives it from a single task: commands mutate
//! state directly, [`ChatClient::next_event`] pumps the live feeds. There
//! is no locking; every view mutation happens on the caller's thread.

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use magpie_backend::Subscription;
use magpie_shared::validate::validate_message_text;
use magpie_shared::{
    ChannelError, ConversationKey, Handle, HandleGenerator, LocalMessageId, Message, MessageBody,
    MessageDraft, PushToken,
};
use magpie_store::StoredPushToken;

use crate::auth;
use crate::config::ClientConfig;
use crate::context::AppContext;
use crate::conversation::ConversationView;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::roster::Roster;
use crate::session::Session;
use crate::unread::UnreadLedger;

/// The open conversation with its feed and the epoch it was opened under.
struct ActiveConversation {
    view: ConversationView,
    feed: Subscription<Vec<Message>>,
    epoch: u64,
}

/// Client core for one signed-in session.
pub struct ChatClient {
    ctx: AppContext,
    config: ClientConfig,
    session: Session,
    roster: Roster,
    unread: UnreadLedger,
    unread_feed: Subscription<Vec<Message>>,
    active: Option<ActiveConversation>,
    next_epoch: u64,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatClient {
    /// Establish the session (bootstrapping a profile on first run), then
    /// start the client.
    pub async fn start(ctx: AppContext, config: ClientConfig) -> Result<Self> {
        let mut generator = HandleGenerator::new();
        let session = Session::establish(&ctx, &mut generator, config.handle_attempts).await?;
        Self::new(ctx, config, session).await
    }

    /// Build a client for an established session and subscribe its unread
    /// feed.
    pub async fn new(ctx: AppContext, config: ClientConfig, session: Session) -> Result<Self> {
        let unread_feed = ctx.channel.subscribe_unread(&session.handle).await?;
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            unread: UnreadLedger::new(session.handle.clone()),
            roster: Roster::new(),
            ctx,
            config,
            session,
            unread_feed,
            active: None,
            next_epoch: 0,
            events,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn unread(&self) -> &UnreadLedger {
        &self.unread
    }

    /// The open conversation, if any.
    pub fn conversation(&self) -> Option<&ConversationView> {
        self.active.as_ref().map(|a| &a.view)
    }

    /// Subscribe to state-change events. Any number of receivers.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Conversation lifecycle
    // ------------------------------------------------------------------

    /// Open the conversation with `peer`, replacing any previous one.
    ///
    /// The epoch bump plus the drop of the previous subscription guarantee
    /// that a snapshot still in flight for the old conversation cannot
    /// land in the new view.
    pub async fn open_conversation(&mut self, peer: Handle) -> Result<()> {
        self.next_epoch += 1;
        let epoch = self.next_epoch;

        // Release the previous feed before creating the next one.
        self.active = None;

        let view = ConversationView::new(self.session.handle.clone(), peer.clone());
        let feed = self.ctx.channel.subscribe(view.key()).await?;
        self.active = Some(ActiveConversation { view, feed, epoch });

        self.mark_conversation_read(&peer).await;

        info!(peer = %peer, epoch, "Conversation opened");
        Ok(())
    }

    /// Close the open conversation, releasing its feed.
    pub fn close_conversation(&mut self) {
        if let Some(active) = self.active.take() {
            info!(peer = %active.view.peer(), "Conversation closed");
        }
    }

    /// Zero a peer's unread count and flip the read flags durably.
    ///
    /// The local count drops immediately. The durable flip is retried a
    /// bounded number of times; if every attempt fails the flags stay
    /// unread on the channel and the next open tries again, so nothing is
    /// lost either way.
    pub async fn mark_conversation_read(&mut self, peer: &Handle) {
        let ids = self.unread.clear_peer(peer);
        if ids.is_empty() {
            return;
        }
        self.emit(ClientEvent::UnreadChanged {
            peer: peer.clone(),
            count: 0,
        });

        if let Some(active) = self.active.as_mut() {
            if active.view.peer() == peer {
                active.view.note_read(&ids);
            }
        }

        let key = ConversationKey::between(&self.session.handle, peer);
        for attempt in 1..=self.config.mark_read_attempts {
            match self.ctx.channel.mark_read(&key, &ids).await {
                Ok(()) => {
                    debug!(peer = %peer, flipped = ids.len(), "Read flags updated");
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Failed to flip read flags");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send a text message to the open conversation's peer. Returns the
    /// local id usable for retry and discard.
    pub async fn send_text(&mut self, text: &str) -> Result<LocalMessageId> {
        validate_message_text(text)?;
        self.send_body(MessageBody::text(text)).await
    }

    /// Send an attachment reference.
    ///
    /// The reference is session-scoped: `blob:` URLs are minted here and
    /// stop resolving once this session ends. The reference itself still
    /// delivers and renders as an attachment on the other side.
    pub async fn send_attachment(&mut self, mime_type: &str) -> Result<LocalMessageId> {
        let url = format!("blob:{}", Uuid::new_v4());
        self.send_body(MessageBody::Attachment {
            url,
            mime_type: mime_type.to_string(),
        })
        .await
    }

    /// Re-append a failed entry. Unknown or non-failed ids are a no-op.
    pub async fn retry_send(&mut self, local_id: LocalMessageId) -> Result<()> {
        let (key, draft) = {
            let active = self.active.as_mut().ok_or(ClientError::NoOpenConversation)?;
            match active.view.retry(local_id) {
                Some(draft) => (active.view.key().clone(), draft),
                None => return Ok(()),
            }
        };

        self.emit(ClientEvent::ConversationUpdated { key: key.clone() });
        self.append_draft(key, draft, local_id).await;
        Ok(())
    }

    /// Drop a failed entry from the timeline.
    pub fn discard_failed(&mut self, local_id: LocalMessageId) -> Result<bool> {
        let active = self.active.as_mut().ok_or(ClientError::NoOpenConversation)?;
        let removed = active.view.discard(local_id);
        if removed {
            let key = active.view.key().clone();
            self.emit(ClientEvent::ConversationUpdated { key });
        }
        Ok(removed)
    }

    async fn send_body(&mut self, body: MessageBody) -> Result<LocalMessageId> {
        let (key, draft, local_id) = {
            let active = self.active.as_mut().ok_or(ClientError::NoOpenConversation)?;
            let draft = MessageDraft {
                sender: self.session.handle.clone(),
                recipient: active.view.peer().clone(),
                body,
            };
            let local_id = active.view.begin_send(draft.clone());
            (active.view.key().clone(), draft, local_id)
        };

        self.emit(ClientEvent::ConversationUpdated { key: key.clone() });
        self.append_draft(key, draft, local_id).await;
        Ok(local_id)
    }

    /// Issue the durable append and reconcile its outcome into the view.
    async fn append_draft(
        &mut self,
        key: ConversationKey,
        draft: MessageDraft,
        local_id: LocalMessageId,
    ) {
        match self.ctx.channel.append(&key, draft).await {
            Ok(receipt) => {
                debug!(local = %local_id, server = %receipt.id, "Message confirmed");
                if let Some(active) = self.active.as_mut() {
                    active.view.apply_send_ack(local_id, &receipt);
                }
            }
            Err(e) => {
                warn!(local = %local_id, error = %e, "Append failed");
                let reason = e.to_string();
                if let Some(active) = self.active.as_mut() {
                    active.view.apply_send_failure(local_id, reason.clone());
                }
                self.emit(ClientEvent::MessageFailed { local_id, reason });
            }
        }
        self.emit(ClientEvent::ConversationUpdated { key });
    }

    // ------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------

    /// Wait for the next feed delivery, apply it, and return the resulting
    /// event. Deliveries that change nothing visible are absorbed and the
    /// wait continues.
    pub async fn next_event(&mut self) -> Result<ClientEvent> {
        enum FeedUpdate {
            Conversation(u64, std::result::Result<Vec<Message>, ChannelError>),
            Unread(std::result::Result<Vec<Message>, ChannelError>),
        }

        loop {
            let update = {
                let Self {
                    active,
                    unread_feed,
                    ..
                } = self;

                let conversation = async {
                    match active.as_mut() {
                        Some(active) => {
                            FeedUpdate::Conversation(active.epoch, active.feed.recv().await)
                        }
                        None => std::future::pending::<FeedUpdate>().await,
                    }
                };
                let unread = async { FeedUpdate::Unread(unread_feed.recv().await) };

                tokio::select! {
                    update = conversation => update,
                    update = unread => update,
                }
            };

            match update {
                FeedUpdate::Conversation(epoch, Ok(snapshot)) => {
                    if let Some(event) = self.apply_conversation_snapshot(epoch, snapshot) {
                        return Ok(event);
                    }
                }
                FeedUpdate::Conversation(_, Err(e)) => {
                    warn!(error = %e, "Conversation feed ended");
                    if let Some(active) = self.active.take() {
                        let event = ClientEvent::SubscriptionLost {
                            key: active.view.key().clone(),
                        };
                        self.emit(event.clone());
                        return Ok(event);
                    }
                }
                FeedUpdate::Unread(Ok(snapshot)) => {
                    if let Some(event) = self.apply_unread_snapshot(&snapshot) {
                        return Ok(event);
                    }
                }
                FeedUpdate::Unread(Err(e)) => {
                    warn!(error = %e, "Unread feed ended");
                    return Err(ClientError::Channel(e));
                }
            }
        }
    }

    /// Apply a snapshot tagged with the epoch its subscription was opened
    /// under. A snapshot from a superseded epoch is dropped: the
    /// conversation switched while it was in flight.
    fn apply_conversation_snapshot(
        &mut self,
        epoch: u64,
        snapshot: Vec<Message>,
    ) -> Option<ClientEvent> {
        let active = self.active.as_mut()?;
        if active.epoch != epoch {
            debug!(epoch, current = active.epoch, "Ignoring stale conversation snapshot");
            return None;
        }

        if let Some(latest) = snapshot.iter().map(|m| m.sent_at).max() {
            let peer = active.view.peer().clone();
            self.roster.note_activity(&peer, latest);
        }

        let active = self.active.as_mut()?;
        active.view.apply_snapshot(snapshot);
        let event = ClientEvent::ConversationUpdated {
            key: active.view.key().clone(),
        };
        self.emit(event.clone());
        Some(event)
    }

    /// Rebuild the unread ledger from a feed snapshot. Returns the event
    /// for the last changed peer, if any count moved.
    fn apply_unread_snapshot(&mut self, snapshot: &[Message]) -> Option<ClientEvent> {
        let before = self.unread.counts();
        self.unread.apply_snapshot(snapshot);
        let after = self.unread.counts();

        for message in snapshot {
            if message.recipient == self.session.handle {
                self.roster.note_activity(&message.sender, message.sent_at);
            }
        }

        let mut peers: Vec<&Handle> = before.keys().chain(after.keys()).collect();
        peers.sort();
        peers.dedup();

        let mut last = None;
        for peer in peers {
            let old = before.get(peer).copied().unwrap_or(0);
            let new = after.get(peer).copied().unwrap_or(0);
            if old != new {
                let event = ClientEvent::UnreadChanged {
                    peer: peer.clone(),
                    count: new,
                };
                self.emit(event.clone());
                last = Some(event);
            }
        }
        last
    }

    // ------------------------------------------------------------------
    // Roster, push, teardown
    // ------------------------------------------------------------------

    /// Pull the directory's profile list into the roster.
    pub async fn refresh_roster(&mut self) -> Result<()> {
        let profiles = self.ctx.directory.list_profiles().await?;
        self.roster.update(profiles, &self.session.handle);
        Ok(())
    }

    /// Register this device for pushes and persist the token.
    ///
    /// Push is informational only; message delivery never depends on it.
    pub async fn register_push(&self) -> Result<PushToken> {
        let token = self.ctx.push.register_device(&self.session.account).await?;
        self.ctx.store.save_push_token(&StoredPushToken {
            token: token.clone(),
            registered_at: Utc::now(),
        })?;
        info!(token = %token, "Push registration stored");
        Ok(token)
    }

    /// Sign out of the provider, wipe on-device state, and tear the client
    /// down.
    pub async fn sign_out(self) -> Result<()> {
        let ChatClient {
            ctx,
            active,
            unread_feed,
            ..
        } = self;

        // Feeds are released before the provider forgets us.
        drop(active);
        drop(unread_feed);
        auth::sign_out(&ctx).await
    }

    fn emit(&self, event: ClientEvent) {
        // No receiver is fine; state queries expose the same picture.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use magpie_backend::MemoryBackend;
    use magpie_shared::MessageId;
    use magpie_store::Database;

    use crate::conversation::Delivery;

    use super::*;

    async fn client_with_seed(
        backend: &Arc<MemoryBackend>,
        dir: &tempfile::TempDir,
        name: &str,
        seed: u64,
    ) -> ChatClient {
        let store = Database::open_at(&dir.path().join(name)).unwrap();
        let ctx = AppContext::in_memory(backend, store);
        let mut generator = HandleGenerator::with_rng(StdRng::seed_from_u64(seed));
        let session = Session::establish(&ctx, &mut generator, 16).await.unwrap();
        ChatClient::new(ctx, ClientConfig::default(), session)
            .await
            .unwrap()
    }

    async fn pair(
        backend: &Arc<MemoryBackend>,
        dir: &tempfile::TempDir,
    ) -> (ChatClient, ChatClient) {
        let alice = client_with_seed(backend, dir, "alice.db", 1).await;
        let bob = client_with_seed(backend, dir, "bob.db", 2).await;
        (alice, bob)
    }

    #[tokio::test]
    async fn test_send_appears_in_both_sessions() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, mut bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();

        alice.open_conversation(bob_handle.clone()).await.unwrap();
        bob.open_conversation(alice_handle.clone()).await.unwrap();

        alice.send_text("hello bob").await.unwrap();

        // Bob's two feeds both fire: the conversation snapshot and the
        // unread update, in either order.
        let mut got_conversation = false;
        let mut got_unread = false;
        for _ in 0..2 {
            match bob.next_event().await.unwrap() {
                ClientEvent::ConversationUpdated { .. } => got_conversation = true,
                ClientEvent::UnreadChanged { peer, count } => {
                    assert_eq!(peer, alice_handle);
                    assert_eq!(count, 1);
                    got_unread = true;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(got_conversation && got_unread);

        let view = bob.conversation().unwrap();
        let rendered: Vec<_> = view.messages().collect();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].sender, alice_handle);
        assert_eq!(rendered[0].recipient, bob_handle);
        assert_eq!(rendered[0].body, MessageBody::text("hello bob"));
        assert!(!rendered[0].read);
        assert_eq!(rendered[0].delivery, Delivery::Confirmed);
    }

    #[tokio::test]
    async fn test_opening_conversation_flips_read_flags() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, mut bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();

        alice.open_conversation(bob_handle.clone()).await.unwrap();
        alice.send_text("one").await.unwrap();
        alice.send_text("two").await.unwrap();

        let event = bob.next_event().await.unwrap();
        assert_eq!(
            event,
            ClientEvent::UnreadChanged {
                peer: alice_handle.clone(),
                count: 2
            }
        );
        assert_eq!(bob.unread().total(), 2);

        bob.open_conversation(alice_handle.clone()).await.unwrap();
        assert_eq!(bob.unread().count_for(&alice_handle), 0);

        // The flip is durable: alice sees her messages as read.
        let event = alice.next_event().await.unwrap();
        assert!(matches!(event, ClientEvent::ConversationUpdated { .. }));
        let rendered: Vec<_> = alice.conversation().unwrap().messages().collect();
        assert_eq!(rendered.len(), 2);
        assert!(rendered.iter().all(|m| m.read));
    }

    #[tokio::test]
    async fn test_offline_send_fails_then_retry_converges() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, mut bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();

        alice.open_conversation(bob_handle.clone()).await.unwrap();

        let mut rx = alice.events();
        backend.set_offline(true);
        let local = alice.send_text("hello").await.unwrap();

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if let ClientEvent::MessageFailed { local_id, .. } = event {
                assert_eq!(local_id, local);
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        {
            let rendered: Vec<_> = alice.conversation().unwrap().messages().collect();
            assert_eq!(rendered.len(), 1);
            assert!(matches!(rendered[0].delivery, Delivery::Failed { .. }));
            assert_eq!(rendered[0].body, MessageBody::text("hello"));
        }

        backend.set_offline(false);
        alice.retry_send(local).await.unwrap();

        let rendered: Vec<_> = alice.conversation().unwrap().messages().collect();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].local_id, local);
        assert_eq!(rendered[0].delivery, Delivery::Confirmed);

        // Exactly one copy reached the other side.
        let event = bob.next_event().await.unwrap();
        assert_eq!(
            event,
            ClientEvent::UnreadChanged {
                peer: alice_handle,
                count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_stale_epoch_snapshot_is_dropped() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();

        alice.open_conversation(bob_handle.clone()).await.unwrap();
        let stale_epoch = alice.active.as_ref().unwrap().epoch;

        let other = Handle::new("happypanda3");
        alice.open_conversation(other.clone()).await.unwrap();

        let stale = vec![Message {
            id: MessageId("m1".to_string()),
            conversation: ConversationKey::between(&alice_handle, &bob_handle),
            sender: bob_handle.clone(),
            recipient: alice_handle.clone(),
            body: MessageBody::text("stale"),
            sent_at: Utc::now(),
            read: false,
        }];
        assert!(alice
            .apply_conversation_snapshot(stale_epoch, stale)
            .is_none());
        assert_eq!(alice.conversation().unwrap().messages().count(), 0);

        // The live epoch still applies.
        let live_epoch = alice.active.as_ref().unwrap().epoch;
        let fresh = vec![Message {
            id: MessageId("m2".to_string()),
            conversation: ConversationKey::between(&alice_handle, &other),
            sender: other.clone(),
            recipient: alice_handle.clone(),
            body: MessageBody::text("fresh"),
            sent_at: Utc::now(),
            read: false,
        }];
        assert!(alice
            .apply_conversation_snapshot(live_epoch, fresh)
            .is_some());
        assert_eq!(alice.conversation().unwrap().messages().count(), 1);
    }

    #[tokio::test]
    async fn test_switching_and_closing_release_subscriptions() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();
        let key = ConversationKey::between(&alice_handle, &bob_handle);

        alice.open_conversation(bob_handle.clone()).await.unwrap();
        assert_eq!(backend.conversation_subscribers(&key), 1);

        // Reopening replaces the subscription, never stacks it.
        alice.open_conversation(bob_handle.clone()).await.unwrap();
        assert_eq!(backend.conversation_subscribers(&key), 1);

        alice.close_conversation();
        assert_eq!(backend.conversation_subscribers(&key), 0);
        assert!(alice.conversation().is_none());
    }

    #[tokio::test]
    async fn test_send_requires_open_conversation_and_valid_text() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, _bob) = pair(&backend, &dir).await;

        assert!(matches!(
            alice.send_text("hi").await,
            Err(ClientError::NoOpenConversation)
        ));
        // Validation runs before the open-conversation check.
        assert!(matches!(
            alice.send_text("   ").await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_attachment_reference_delivers() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, mut bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();

        alice.open_conversation(bob_handle.clone()).await.unwrap();
        alice.send_attachment("image/png").await.unwrap();

        bob.open_conversation(alice_handle.clone()).await.unwrap();
        for _ in 0..3 {
            if let ClientEvent::ConversationUpdated { .. } = bob.next_event().await.unwrap() {
                break;
            }
        }

        let view = bob.conversation().unwrap();
        let first = view.messages().next().unwrap();
        match &first.body {
            MessageBody::Attachment { url, mime_type } => {
                assert!(url.starts_with("blob:"));
                assert_eq!(mime_type, "image/png");
            }
            other => panic!("expected attachment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_roster_lists_directory_peers() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, bob) = pair(&backend, &dir).await;
        let bob_handle = bob.session().handle.clone();

        alice.refresh_roster().await.unwrap();

        let handles: Vec<_> = alice
            .roster()
            .peers()
            .iter()
            .map(|p| p.handle.clone())
            .collect();
        assert_eq!(handles, vec![bob_handle]);
    }

    #[tokio::test]
    async fn test_sign_out_tears_everything_down() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let (mut alice, bob) = pair(&backend, &dir).await;
        let alice_handle = alice.session().handle.clone();
        let bob_handle = bob.session().handle.clone();
        let key = ConversationKey::between(&alice_handle, &bob_handle);

        alice.open_conversation(bob_handle).await.unwrap();
        let store = alice.ctx.store.clone();

        alice.sign_out().await.unwrap();

        assert_eq!(backend.conversation_subscribers(&key), 0);
        assert_eq!(backend.unread_subscribers(&alice_handle), 0);
        assert!(store.load_session().unwrap().is_none());
    }
}
