//! Chat client core.
//!
//! Everything a frontend needs for 1:1 messaging: session bootstrap with
//! handle generation, an optimistic send pipeline, unread tracking and a
//! peer roster, tied together by the caller-driven [`ChatClient`].
//!
//! The crate is backend-agnostic. All network-shaped collaborators are
//! reached through the traits in `magpie-backend`, bundled into an
//! [`AppContext`]; swap the wiring and the client logic stays untouched.

pub mod auth;
pub mod chat;
pub mod config;
pub mod context;
pub mod conversation;
pub mod events;
pub mod roster;
pub mod session;
pub mod timeline;
pub mod unread;

mod error;

pub use chat::ChatClient;
pub use config::ClientConfig;
pub use context::AppContext;
pub use conversation::{ConversationView, Delivery, ViewMessage};
pub use error::{ClientError, Result};
pub use events::ClientEvent;
pub use roster::Roster;
pub use session::Session;
pub use unread::UnreadLedger;
