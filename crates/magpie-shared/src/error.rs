use thiserror::Error;

use crate::types::Handle;

/// Identity provider failures surfaced to the sign-in / sign-up flows.
///
/// These are shown to the user and never retried automatically.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong email/password combination, or no such account.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Sign-up with an email that already has an account.
    #[error("An account already exists for this email")]
    EmailInUse,

    /// The provider rejected the password at account creation.
    #[error("Password rejected by the identity provider")]
    WeakPassword,

    /// An operation that needs a signed-in account found none.
    #[error("No account is signed in")]
    NotSignedIn,

    /// Transport-level failure reaching the provider.
    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),
}

/// Profile directory failures. Any of these aborts profile bootstrap; a
/// handle is never fabricated without being persisted.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory read failed: {0}")]
    Read(String),

    #[error("Directory write failed: {0}")]
    Write(String),

    /// Another account registered the handle between the uniqueness check
    /// and the write.
    #[error("Handle already registered: {0}")]
    HandleTaken(Handle),

    /// No free handle found within the allowed attempts.
    #[error("Could not find a free handle after {0} attempts")]
    HandleExhausted(u32),
}

/// Message channel failures.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel backend offline")]
    Offline,

    #[error("Append rejected: {0}")]
    Append(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    /// The feed ended because the backend went away.
    #[error("Subscription closed")]
    Closed,

    #[error("Read-flag update failed: {0}")]
    MarkRead(String),
}

/// Push gateway failures. Push is informational; none of these ever blocks
/// message delivery.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Device registration failed: {0}")]
    Registration(String),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Unknown push token")]
    UnknownToken,
}

/// Input rejected before reaching any backend.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters long")]
    PasswordTooShort,

    #[error("Message text cannot be empty")]
    EmptyMessage,

    #[error("Message text exceeds the maximum size")]
    MessageTooLong,
}
