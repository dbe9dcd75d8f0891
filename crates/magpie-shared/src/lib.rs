//! # magpie-shared
//!
//! Domain types shared by every magpie crate: account and handle identifiers,
//! conversation addressing, message shapes, handle generation, input
//! validation, and the error taxonomy surfaced to embedders.

pub mod constants;
pub mod handle;
pub mod message;
pub mod types;
pub mod validate;

mod error;

pub use error::{AuthError, ChannelError, DirectoryError, PushError, ValidationError};
pub use handle::HandleGenerator;
pub use message::{AppendReceipt, Message, MessageBody, MessageDraft};
pub use types::{
    AccountId, ConversationKey, Handle, LocalMessageId, MessageId, Profile, PushNotification,
    PushToken,
};
