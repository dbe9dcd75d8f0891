//! Profile bootstrap: who this device is.
//!
//! Resolution order is cache, then directory, then handle generation. The
//! generation loop is bounded; once it exhausts its attempts a candidate
//! with a random hex suffix is tried once. A handle is only ever cached
//! after the directory accepted it, so the device cannot invent an
//! identity the rest of the system does not know.

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use magpie_shared::{AccountId, DirectoryError, Handle, HandleGenerator, Profile};
use magpie_store::CachedSession;

use crate::context::AppContext;
use crate::error::Result;

/// The established local identity: account plus directory handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account: AccountId,
    pub handle: Handle,
}

impl Session {
    /// Establish the local identity, creating it on first run.
    ///
    /// Directory failures abort the bootstrap; the cached account (if one
    /// was already saved) lets the next call resume where this one
    /// stopped.
    pub async fn establish<R: Rng>(
        ctx: &AppContext,
        generator: &mut HandleGenerator<R>,
        attempts: u32,
    ) -> Result<Self> {
        // Cache hit: nothing to do.
        let cached = ctx.store.load_session()?;
        if let Some(ref session) = cached {
            if let Some(ref handle) = session.handle {
                debug!(handle = %handle, "Session restored from cache");
                return Ok(Self {
                    account: session.account.clone(),
                    handle: handle.clone(),
                });
            }
        }

        // Account: a cached one from an interrupted bootstrap, the
        // provider's signed-in one, or a fresh anonymous account.
        let account = match cached {
            Some(session) => session.account,
            None => {
                let current = ctx.identity.watch_account().borrow().clone();
                let account = match current {
                    Some(account) => account,
                    None => ctx.identity.sign_in_anonymous().await?,
                };
                ctx.store.save_session(&CachedSession {
                    account: account.clone(),
                    handle: None,
                    created_at: Utc::now(),
                })?;
                account
            }
        };

        // The directory may already know this account.
        if let Some(profile) = ctx.directory.profile_for_account(&account).await? {
            ctx.store.update_session_handle(&profile.handle)?;
            info!(handle = %profile.handle, "Profile recovered from directory");
            return Ok(Self {
                account,
                handle: profile.handle,
            });
        }

        let handle = claim_handle(ctx, &account, generator, attempts).await?;
        ctx.store.update_session_handle(&handle)?;
        info!(handle = %handle, "Profile created");
        Ok(Self { account, handle })
    }
}

/// Find an unclaimed handle and register it, treating a lost registration
/// race exactly like a collision.
async fn claim_handle<R: Rng>(
    ctx: &AppContext,
    account: &AccountId,
    generator: &mut HandleGenerator<R>,
    attempts: u32,
) -> Result<Handle> {
    for attempt in 0..attempts {
        let candidate = generator.candidate();
        if ctx.directory.handle_exists(&candidate).await? {
            debug!(attempt, handle = %candidate, "Handle collision, regenerating");
            continue;
        }
        match register(ctx, account, &candidate).await {
            Ok(()) => return Ok(candidate),
            Err(DirectoryError::HandleTaken(_)) => {
                debug!(attempt, handle = %candidate, "Lost registration race, regenerating");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    // A suffixed candidate carries enough entropy that a further collision
    // means something is wrong with the directory, not with our luck.
    let candidate = generator.suffixed_candidate();
    if ctx.directory.handle_exists(&candidate).await? {
        return Err(DirectoryError::HandleExhausted(attempts).into());
    }
    match register(ctx, account, &candidate).await {
        Ok(()) => Ok(candidate),
        Err(DirectoryError::HandleTaken(_)) => Err(DirectoryError::HandleExhausted(attempts).into()),
        Err(e) => Err(e.into()),
    }
}

async fn register(
    ctx: &AppContext,
    account: &AccountId,
    handle: &Handle,
) -> std::result::Result<(), DirectoryError> {
    ctx.directory
        .register_profile(&Profile {
            account: account.clone(),
            handle: handle.clone(),
            created_at: Utc::now(),
        })
        .await
}
