//! Complete in-process backend.
//!
//! [`MemoryBackend`] holds accounts, the profile directory, conversation
//! logs and push registrations behind one mutex. Each client opens its own
//! [`MemoryConnection`], which carries per-client auth state while all data
//! is shared, so several sessions can talk to each other through a single
//! backend instance.
//!
//! Feed deliveries go out through `watch` channels: every mutation stores
//! the full new state and subscribers observe the latest snapshot.
//!
//! Failure injection for tests and demos: [`MemoryBackend::set_offline`]
//! makes channel operations fail, [`MemoryBackend::set_directory_down`]
//! makes directory calls fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use magpie_shared::{
    AccountId, AppendReceipt, AuthError, ChannelError, ConversationKey, DirectoryError, Handle,
    Message, MessageDraft, MessageId, Profile, PushError, PushNotification, PushToken,
};

use crate::channel::MessageChannel;
use crate::directory::ProfileDirectory;
use crate::identity::IdentityProvider;
use crate::push::PushGateway;
use crate::subscription::Subscription;

/// Shared backend state. Create once, then open one
/// [`MemoryConnection`] per client session.
pub struct MemoryBackend {
    state: Mutex<State>,
}

/// One client's view of the backend. Auth state is per connection; profiles,
/// conversations and devices are shared through the backend.
pub struct MemoryConnection {
    backend: Arc<MemoryBackend>,
    account_tx: watch::Sender<Option<AccountId>>,
}

impl MemoryConnection {
    /// Open a connection with its own (signed-out) auth state.
    pub fn open(backend: &Arc<MemoryBackend>) -> Arc<MemoryConnection> {
        let (account_tx, _) = watch::channel(None);
        Arc::new(MemoryConnection {
            backend: Arc::clone(backend),
            account_tx,
        })
    }
}

struct Credential {
    account: AccountId,
    password: String,
}

struct ConversationLog {
    messages: Vec<Message>,
    feed: watch::Sender<Vec<Message>>,
}

impl Default for ConversationLog {
    fn default() -> Self {
        let (feed, _) = watch::channel(Vec::new());
        Self {
            messages: Vec::new(),
            feed,
        }
    }
}

struct Device {
    account: AccountId,
    tx: mpsc::UnboundedSender<PushNotification>,
    pending_rx: Option<mpsc::UnboundedReceiver<PushNotification>>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Credential>,
    profiles: Vec<Profile>,
    logs: HashMap<ConversationKey, ConversationLog>,
    unread_feeds: HashMap<Handle, watch::Sender<Vec<Message>>>,
    devices: HashMap<PushToken, Device>,
    offline: bool,
    directory_down: bool,
}

impl State {
    /// Recompute and publish the unread feed for one recipient, if anyone
    /// is watching it.
    fn refresh_unread(&self, recipient: &Handle) {
        if let Some(feed) = self.unread_feeds.get(recipient) {
            feed.send_replace(compute_unread(&self.logs, recipient));
        }
    }

    /// Deliver a push notification to every device registered for the
    /// message's recipient.
    fn push_notify(&self, message: &Message) {
        let account = match self
            .profiles
            .iter()
            .find(|p| p.handle == message.recipient)
        {
            Some(profile) => &profile.account,
            None => return,
        };

        let notification = PushNotification {
            title: format!("New message from {}", message.sender),
            body: message.body.preview(),
        };

        for device in self.devices.values() {
            if &device.account == account {
                let _ = device.tx.send(notification.clone());
            }
        }
    }
}

/// All unread messages addressed to `recipient`, oldest first.
fn compute_unread(
    logs: &HashMap<ConversationKey, ConversationLog>,
    recipient: &Handle,
) -> Vec<Message> {
    let mut unread: Vec<Message> = logs
        .values()
        .flat_map(|log| log.messages.iter())
        .filter(|m| &m.recipient == recipient && !m.read)
        .cloned()
        .collect();
    unread.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
    unread
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, String> {
        self.state
            .lock()
            .map_err(|e| format!("backend state lock poisoned: {}", e))
    }

    /// Make channel operations fail, as if the network were down.
    /// Existing subscriptions stay alive.
    pub fn set_offline(&self, offline: bool) {
        match self.lock() {
            Ok(mut state) => state.offline = offline,
            Err(e) => warn!(error = %e, "set_offline skipped"),
        }
    }

    /// Make directory operations fail.
    pub fn set_directory_down(&self, down: bool) {
        match self.lock() {
            Ok(mut state) => state.directory_down = down,
            Err(e) => warn!(error = %e, "set_directory_down skipped"),
        }
    }

    /// Number of live subscribers on a conversation feed.
    pub fn conversation_subscribers(&self, key: &ConversationKey) -> usize {
        match self.lock() {
            Ok(state) => state
                .logs
                .get(key)
                .map(|log| log.feed.receiver_count())
                .unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "conversation_subscribers skipped");
                0
            }
        }
    }

    /// Number of live subscribers on a recipient's unread feed.
    pub fn unread_subscribers(&self, recipient: &Handle) -> usize {
        match self.lock() {
            Ok(state) => state
                .unread_feeds
                .get(recipient)
                .map(|feed| feed.receiver_count())
                .unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "unread_subscribers skipped");
                0
            }
        }
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

#[async_trait]
impl IdentityProvider for MemoryConnection {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AccountId, AuthError> {
        let account = {
            let state = self.backend.lock().map_err(AuthError::Unreachable)?;
            let credential = state
                .accounts
                .get(email)
                .ok_or(AuthError::InvalidCredentials)?;
            if credential.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            credential.account.clone()
        };

        self.account_tx.send_replace(Some(account.clone()));
        info!(account = %account, "signed in");
        Ok(account)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AccountId, AuthError> {
        let account = {
            let mut state = self.backend.lock().map_err(AuthError::Unreachable)?;
            if state.accounts.contains_key(email) {
                return Err(AuthError::EmailInUse);
            }
            if password.chars().count() < magpie_shared::constants::MIN_PASSWORD_LEN {
                return Err(AuthError::WeakPassword);
            }

            let account = AccountId(Uuid::new_v4().to_string());
            state.accounts.insert(
                email.to_string(),
                Credential {
                    account: account.clone(),
                    password: password.to_string(),
                },
            );
            account
        };

        self.account_tx.send_replace(Some(account.clone()));
        info!(account = %account, "account created");
        Ok(account)
    }

    async fn sign_in_anonymous(&self) -> Result<AccountId, AuthError> {
        let account = AccountId(Uuid::new_v4().to_string());
        self.account_tx.send_replace(Some(account.clone()));
        info!(account = %account, "anonymous sign-in");
        Ok(account)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.account_tx.send_replace(None);
        info!("signed out");
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let state = self.backend.lock().map_err(AuthError::Unreachable)?;
        if !state.accounts.contains_key(email) {
            return Err(AuthError::InvalidCredentials);
        }
        info!(email, "password reset requested");
        Ok(())
    }

    fn watch_account(&self) -> watch::Receiver<Option<AccountId>> {
        self.account_tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// ProfileDirectory
// ---------------------------------------------------------------------------

#[async_trait]
impl ProfileDirectory for MemoryConnection {
    async fn profile_for_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<Profile>, DirectoryError> {
        let state = self.backend.lock().map_err(DirectoryError::Read)?;
        if state.directory_down {
            return Err(DirectoryError::Read("directory unavailable".to_string()));
        }
        Ok(state
            .profiles
            .iter()
            .find(|p| &p.account == account)
            .cloned())
    }

    async fn handle_exists(&self, handle: &Handle) -> Result<bool, DirectoryError> {
        let state = self.backend.lock().map_err(DirectoryError::Read)?;
        if state.directory_down {
            return Err(DirectoryError::Read("directory unavailable".to_string()));
        }
        Ok(state.profiles.iter().any(|p| &p.handle == handle))
    }

    async fn register_profile(&self, profile: &Profile) -> Result<(), DirectoryError> {
        let mut state = self.backend.lock().map_err(DirectoryError::Write)?;
        if state.directory_down {
            return Err(DirectoryError::Write("directory unavailable".to_string()));
        }

        let taken = state
            .profiles
            .iter()
            .any(|p| p.handle == profile.handle && p.account != profile.account);
        if taken {
            return Err(DirectoryError::HandleTaken(profile.handle.clone()));
        }

        match state
            .profiles
            .iter()
            .position(|p| p.account == profile.account)
        {
            Some(i) => state.profiles[i] = profile.clone(),
            None => state.profiles.push(profile.clone()),
        }

        info!(account = %profile.account, handle = %profile.handle, "profile registered");
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, DirectoryError> {
        let state = self.backend.lock().map_err(DirectoryError::Read)?;
        if state.directory_down {
            return Err(DirectoryError::Read("directory unavailable".to_string()));
        }
        Ok(state.profiles.clone())
    }
}

// ---------------------------------------------------------------------------
// MessageChannel
// ---------------------------------------------------------------------------

#[async_trait]
impl MessageChannel for MemoryConnection {
    async fn subscribe(
        &self,
        key: &ConversationKey,
    ) -> Result<Subscription<Vec<Message>>, ChannelError> {
        let mut state = self.backend.lock().map_err(ChannelError::Subscribe)?;
        if state.offline {
            return Err(ChannelError::Offline);
        }
        let log = state.logs.entry(key.clone()).or_default();
        debug!(key = %key, "conversation subscribed");
        Ok(Subscription::new(log.feed.subscribe()))
    }

    async fn append(
        &self,
        key: &ConversationKey,
        draft: MessageDraft,
    ) -> Result<AppendReceipt, ChannelError> {
        let mut state = self.backend.lock().map_err(ChannelError::Append)?;
        if state.offline {
            return Err(ChannelError::Offline);
        }

        let message = Message {
            id: MessageId(Uuid::new_v4().to_string()),
            conversation: key.clone(),
            sender: draft.sender,
            recipient: draft.recipient,
            body: draft.body,
            sent_at: Utc::now(),
            read: false,
        };
        let receipt = AppendReceipt {
            id: message.id.clone(),
            sent_at: message.sent_at,
        };

        let log = state.logs.entry(key.clone()).or_default();
        log.messages.push(message.clone());
        log.feed.send_replace(log.messages.clone());

        state.refresh_unread(&message.recipient);
        state.push_notify(&message);

        debug!(key = %key, id = %message.id, "message appended");
        Ok(receipt)
    }

    async fn mark_read(
        &self,
        key: &ConversationKey,
        ids: &[MessageId],
    ) -> Result<(), ChannelError> {
        let mut state = self.backend.lock().map_err(ChannelError::MarkRead)?;
        if state.offline {
            return Err(ChannelError::Offline);
        }

        let mut flipped: Vec<Handle> = Vec::new();
        if let Some(log) = state.logs.get_mut(key) {
            for message in log.messages.iter_mut() {
                if !message.read && ids.contains(&message.id) {
                    message.read = true;
                    if !flipped.contains(&message.recipient) {
                        flipped.push(message.recipient.clone());
                    }
                }
            }
            if !flipped.is_empty() {
                log.feed.send_replace(log.messages.clone());
            }
        }

        for recipient in &flipped {
            state.refresh_unread(recipient);
        }

        debug!(key = %key, requested = ids.len(), "read flags updated");
        Ok(())
    }

    async fn subscribe_unread(
        &self,
        recipient: &Handle,
    ) -> Result<Subscription<Vec<Message>>, ChannelError> {
        let mut state = self.backend.lock().map_err(ChannelError::Subscribe)?;
        if state.offline {
            return Err(ChannelError::Offline);
        }

        let initial = compute_unread(&state.logs, recipient);
        let feed = state
            .unread_feeds
            .entry(recipient.clone())
            .or_insert_with(|| watch::channel(initial).0);

        debug!(recipient = %recipient, "unread feed subscribed");
        Ok(Subscription::new(feed.subscribe()))
    }
}

// ---------------------------------------------------------------------------
// PushGateway
// ---------------------------------------------------------------------------

#[async_trait]
impl PushGateway for MemoryConnection {
    async fn register_device(&self, account: &AccountId) -> Result<PushToken, PushError> {
        let mut state = self.backend.lock().map_err(PushError::Registration)?;

        let token = PushToken(format!("device-{}", Uuid::new_v4()));
        let (tx, rx) = mpsc::unbounded_channel();
        state.devices.insert(
            token.clone(),
            Device {
                account: account.clone(),
                tx,
                pending_rx: Some(rx),
            },
        );

        debug!(account = %account, token = %token, "device registered");
        Ok(token)
    }

    async fn notifications(
        &self,
        token: &PushToken,
    ) -> Result<mpsc::UnboundedReceiver<PushNotification>, PushError> {
        let mut state = self.backend.lock().map_err(PushError::Registration)?;
        let device = state.devices.get_mut(token).ok_or(PushError::UnknownToken)?;
        device.pending_rx.take().ok_or_else(|| {
            PushError::Registration("notification stream already claimed".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use magpie_shared::MessageBody;

    use super::*;

    fn draft(from: &str, to: &str, text: &str) -> MessageDraft {
        MessageDraft {
            sender: Handle::new(from),
            recipient: Handle::new(to),
            body: MessageBody::text(text),
        }
    }

    fn profile(account: &str, handle: &str) -> Profile {
        Profile {
            account: AccountId(account.to_string()),
            handle: Handle::new(handle),
            created_at: Utc::now(),
        }
    }

    fn test_key() -> ConversationKey {
        ConversationKey::between(&Handle::new("lazytiger7"), &Handle::new("quicklion42"))
    }

    #[tokio::test]
    async fn test_append_delivers_snapshot() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);
        let key = test_key();

        let mut sub = conn.subscribe(&key).await.unwrap();
        assert!(sub.recv().await.unwrap().is_empty());

        conn.append(&key, draft("lazytiger7", "quicklion42", "hello"))
            .await
            .unwrap();

        let snapshot = sub.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].sender, Handle::new("lazytiger7"));
        assert_eq!(snapshot[0].recipient, Handle::new("quicklion42"));
        assert_eq!(snapshot[0].body, MessageBody::text("hello"));
        assert!(!snapshot[0].read);
    }

    #[tokio::test]
    async fn test_mark_read_flips_once() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);
        let key = test_key();

        let receipt = conn
            .append(&key, draft("lazytiger7", "quicklion42", "hello"))
            .await
            .unwrap();

        let mut sub = conn.subscribe(&key).await.unwrap();
        assert!(!sub.recv().await.unwrap()[0].read);

        conn.mark_read(&key, &[receipt.id.clone()]).await.unwrap();
        assert!(sub.recv().await.unwrap()[0].read);

        // Second flip is a no-op, not an error.
        conn.mark_read(&key, &[receipt.id]).await.unwrap();
    }

    #[tokio::test]
    async fn test_unread_feed_tracks_flags() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);
        let key = test_key();
        let recipient = Handle::new("quicklion42");

        conn.append(&key, draft("lazytiger7", "quicklion42", "one"))
            .await
            .unwrap();
        conn.append(&key, draft("lazytiger7", "quicklion42", "two"))
            .await
            .unwrap();

        let mut unread = conn.subscribe_unread(&recipient).await.unwrap();
        let initial = unread.recv().await.unwrap();
        assert_eq!(initial.len(), 2);

        conn.mark_read(&key, &[initial[0].id.clone()]).await.unwrap();
        let after = unread.recv().await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, initial[1].id);
    }

    #[tokio::test]
    async fn test_subscriber_released_on_drop() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);
        let key = test_key();

        assert_eq!(backend.conversation_subscribers(&key), 0);

        let sub = conn.subscribe(&key).await.unwrap();
        assert_eq!(backend.conversation_subscribers(&key), 1);

        drop(sub);
        assert_eq!(backend.conversation_subscribers(&key), 0);
    }

    #[tokio::test]
    async fn test_offline_rejects_channel_writes() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);
        let key = test_key();

        backend.set_offline(true);
        assert!(matches!(
            conn.append(&key, draft("lazytiger7", "quicklion42", "x")).await,
            Err(ChannelError::Offline)
        ));
        assert!(matches!(
            conn.mark_read(&key, &[]).await,
            Err(ChannelError::Offline)
        ));

        backend.set_offline(false);
        assert!(conn
            .append(&key, draft("lazytiger7", "quicklion42", "x"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_directory_down_fails_lookups() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);

        backend.set_directory_down(true);
        assert!(matches!(
            conn.handle_exists(&Handle::new("quicklion42")).await,
            Err(DirectoryError::Read(_))
        ));
        assert!(matches!(
            conn.register_profile(&profile("a", "quicklion42")).await,
            Err(DirectoryError::Write(_))
        ));

        backend.set_directory_down(false);
        assert!(conn.register_profile(&profile("a", "quicklion42")).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_profile_rejects_taken_handle() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);

        conn.register_profile(&profile("account-1", "quicklion42"))
            .await
            .unwrap();

        assert!(matches!(
            conn.register_profile(&profile("account-2", "quicklion42")).await,
            Err(DirectoryError::HandleTaken(_))
        ));

        let profiles = conn.list_profiles().await.unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);
        let mut accounts = conn.watch_account();
        assert!(accounts.borrow().is_none());

        let account = conn.sign_up("user@example.com", "secret1").await.unwrap();
        assert_eq!(accounts.borrow_and_update().as_ref(), Some(&account));

        conn.sign_out().await.unwrap();
        assert!(accounts.borrow_and_update().is_none());

        assert!(matches!(
            conn.sign_in("user@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        let again = conn.sign_in("user@example.com", "secret1").await.unwrap();
        assert_eq!(again, account);

        assert!(matches!(
            conn.sign_up("user@example.com", "secret2").await,
            Err(AuthError::EmailInUse)
        ));
        assert!(matches!(
            conn.sign_up("other@example.com", "short").await,
            Err(AuthError::WeakPassword)
        ));
    }

    #[tokio::test]
    async fn test_connections_have_independent_auth_state() {
        let backend = MemoryBackend::new();
        let first = MemoryConnection::open(&backend);
        let second = MemoryConnection::open(&backend);

        first.sign_in_anonymous().await.unwrap();

        assert!(first.watch_account().borrow().is_some());
        assert!(second.watch_account().borrow().is_none());
    }

    #[tokio::test]
    async fn test_push_fan_out() {
        let backend = MemoryBackend::new();
        let conn = MemoryConnection::open(&backend);

        let account = conn.sign_in_anonymous().await.unwrap();
        conn.register_profile(&profile(account.as_str(), "quicklion42"))
            .await
            .unwrap();

        let token = conn.register_device(&account).await.unwrap();
        let mut inbox = conn.notifications(&token).await.unwrap();

        conn.append(&test_key(), draft("lazytiger7", "quicklion42", "ping"))
            .await
            .unwrap();

        let push = inbox.recv().await.unwrap();
        assert!(push.title.contains("lazytiger7"));
        assert_eq!(push.body, "ping");
    }
}
