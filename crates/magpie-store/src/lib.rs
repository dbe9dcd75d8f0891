//! # magpie-store
//!
//! Local device cache for the magpie client, backed by SQLite.
//!
//! The store holds what a device remembers between launches: the signed-in
//! account, its generated handle, and the device's push registrations.
//! Wiping it only forces a fresh profile bootstrap; the backend stays the
//! source of truth for everything else.

pub mod database;
pub mod migrations;
pub mod models;
pub mod push_tokens;
pub mod session;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
