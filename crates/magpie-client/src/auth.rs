//! Email/password flows, validated before any provider call.

use chrono::Utc;
use tracing::info;

use magpie_shared::validate::{validate_email, validate_password};
use magpie_shared::AccountId;
use magpie_store::CachedSession;

use crate::context::AppContext;
use crate::error::Result;

/// Sign in with email and password.
///
/// Validation failures never reach the provider. Auth failures come back
/// for inline rendering and are not retried here.
pub async fn sign_in(ctx: &AppContext, email: &str, password: &str) -> Result<AccountId> {
    validate_email(email)?;
    validate_password(password)?;

    let account = ctx.identity.sign_in(email, password).await?;
    cache_account(ctx, &account)?;

    info!(account = %account, "Signed in");
    Ok(account)
}

/// Create an account and sign in.
pub async fn sign_up(ctx: &AppContext, email: &str, password: &str) -> Result<AccountId> {
    validate_email(email)?;
    validate_password(password)?;

    let account = ctx.identity.sign_up(email, password).await?;
    cache_account(ctx, &account)?;

    info!(account = %account, "Account created");
    Ok(account)
}

/// Ask the provider to send a password-reset email.
pub async fn request_password_reset(ctx: &AppContext, email: &str) -> Result<()> {
    validate_email(email)?;
    ctx.identity.request_password_reset(email).await?;
    Ok(())
}

/// Sign out of the provider and wipe the device cache.
pub async fn sign_out(ctx: &AppContext) -> Result<()> {
    ctx.identity.sign_out().await?;
    ctx.store.clear_session()?;
    ctx.store.clear_push_tokens()?;
    info!("Signed out");
    Ok(())
}

/// Cache the signed-in account. An existing session for the same account
/// keeps its handle; a different account starts over.
fn cache_account(ctx: &AppContext, account: &AccountId) -> Result<()> {
    let cached = ctx.store.load_session()?;
    if matches!(cached, Some(ref s) if s.account == *account) {
        return Ok(());
    }
    ctx.store.save_session(&CachedSession {
        account: account.clone(),
        handle: None,
        created_at: Utc::now(),
    })?;
    Ok(())
}
