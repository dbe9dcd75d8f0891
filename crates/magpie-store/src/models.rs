//! Model structs persisted in the local device cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use magpie_shared::{AccountId, Handle, PushToken};

/// The device's cached session: which account it belongs to and, once
/// profile bootstrap has completed, the account's handle.
///
/// `handle` is `None` for the window between anonymous sign-in and the
/// directory write; bootstrap fills it in exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedSession {
    pub account: AccountId,
    pub handle: Option<Handle>,
    /// When this session row was first created on this device.
    pub created_at: DateTime<Utc>,
}

/// A push gateway token registered by this device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredPushToken {
    pub token: PushToken,
    pub registered_at: DateTime<Utc>,
}
