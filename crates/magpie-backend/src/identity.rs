//! Identity provider seam.

use async_trait::async_trait;
use tokio::sync::watch;

use magpie_shared::{AccountId, AuthError};

/// Authentication backend. Issues opaque account identifiers and exposes the
/// signed-in account as a watchable value.
///
/// Accounts are either email/password accounts or anonymous throwaway ones;
/// the rest of the system treats both identically.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AccountId, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AccountId, AuthError>;

    /// Provider-generated throwaway account, used when no cached session
    /// exists and the user has not signed in explicitly.
    async fn sign_in_anonymous(&self) -> Result<AccountId, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Observable signed-in account. The receiver sees every sign-in and
    /// sign-out, starting from the current state.
    fn watch_account(&self) -> watch::Receiver<Option<AccountId>>;
}
