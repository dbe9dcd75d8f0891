//! Two-session walkthrough against the in-process backend.
//!
//! Bootstraps two anonymous sessions, then runs the full loop: roster,
//! push registration, an optimistic send with a forced failure and retry,
//! an attachment reference, unread counts and the read-flag flip when the
//! recipient opens the conversation.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use magpie_backend::MemoryBackend;
use magpie_client::{timeline, AppContext, ChatClient, ClientConfig, ClientEvent};
use magpie_store::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // ---- 1. Initialize tracing ----
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,magpie_client=debug,magpie_backend=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- 2. Shared backend and per-session stores ----
    let config = ClientConfig::from_env();
    let data_dir = config
        .data_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("magpie-demo-{}", Uuid::new_v4())));
    std::fs::create_dir_all(&data_dir)?;
    info!(dir = %data_dir.display(), "demo state directory");

    let backend = MemoryBackend::new();

    // ---- 3. Bootstrap two sessions ----
    let alice_ctx =
        AppContext::in_memory(&backend, Database::open_at(&data_dir.join("alice.db"))?);
    let mut alice = ChatClient::start(alice_ctx, config.clone()).await?;

    let bob_ctx = AppContext::in_memory(&backend, Database::open_at(&data_dir.join("bob.db"))?);
    let bob_push = bob_ctx.push.clone();
    let mut bob = ChatClient::start(bob_ctx, config).await?;

    let alice_handle = alice.session().handle.clone();
    let bob_handle = bob.session().handle.clone();
    info!(alice = %alice_handle, bob = %bob_handle, "sessions established");

    // ---- 4. Push registration for bob's device ----
    let token = bob.register_push().await?;
    let mut pushes = bob_push.notifications(&token).await?;

    // ---- 5. Roster ----
    alice.refresh_roster().await?;
    for profile in alice.roster().peers() {
        info!(peer = %profile.handle, "roster entry");
    }

    // ---- 6. Alice sends, with a forced failure and retry ----
    let mut alice_events = alice.events();
    alice.open_conversation(bob_handle.clone()).await?;

    backend.set_offline(true);
    let stuck = alice.send_text("are you there?").await?;
    backend.set_offline(false);
    alice.retry_send(stuck).await?;

    alice.send_text("made it through").await?;
    alice.send_attachment("image/png").await?;

    while let Ok(event) = alice_events.try_recv() {
        println!("alice event: {}", serde_json::to_string(&event)?);
    }
    while let Ok(push) = pushes.try_recv() {
        info!(title = %push.title, body = %push.body, "push received");
    }

    // ---- 7. Bob reads: unread count, then the open flips the flags ----
    let event = bob.next_event().await?;
    println!("bob event: {}", serde_json::to_string(&event)?);
    info!(total = bob.unread().total(), "unread before opening");

    bob.open_conversation(alice_handle.clone()).await?;
    loop {
        if let ClientEvent::ConversationUpdated { .. } = bob.next_event().await? {
            break;
        }
    }
    bob.send_text("here now").await?;

    // ---- 8. Alice sees the reply and clears her unread count ----
    let mut saw_snapshot = false;
    let mut saw_unread = false;
    while !(saw_snapshot && saw_unread) {
        match alice.next_event().await? {
            ClientEvent::ConversationUpdated { .. } => saw_snapshot = true,
            event => {
                if matches!(event, ClientEvent::UnreadChanged { .. }) {
                    saw_unread = true;
                }
                println!("alice event: {}", serde_json::to_string(&event)?);
            }
        }
    }
    alice.mark_conversation_read(&bob_handle).await;

    // ---- 9. Render bob's timeline ----
    if let Some(view) = bob.conversation() {
        for row in timeline::with_day_markers(view.messages()) {
            match row {
                timeline::TimelineRow::DayMarker(label) => println!("-- {} --", label),
                timeline::TimelineRow::Entry(message, time) => {
                    println!("[{}] {}: {}", time, message.sender, message.body.preview());
                }
            }
        }
    }

    // ---- 10. Tear down ----
    bob.sign_out().await?;
    alice.sign_out().await?;
    std::fs::remove_dir_all(&data_dir)?;
    info!("demo complete");
    Ok(())
}
