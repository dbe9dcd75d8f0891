use thiserror::Error;

use magpie_shared::{AuthError, ChannelError, DirectoryError, PushError, ValidationError};
use magpie_store::StoreError;

/// Errors surfaced by client operations.
///
/// Every variant leaves the client usable; callers render the failure and
/// may retry the operation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Push error: {0}")]
    Push(#[from] PushError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No conversation is open")]
    NoOpenConversation,
}

pub type Result<T> = std::result::Result<T, ClientError>;
