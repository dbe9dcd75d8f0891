//! # magpie-backend
//!
//! Trait seams for the delegated backend: identity provider, profile
//! directory, message channel, and push gateway. The client core only ever
//! talks to these traits; [`memory::MemoryBackend`] is a complete in-process
//! implementation used by tests and demos.

pub mod channel;
pub mod directory;
pub mod identity;
pub mod memory;
pub mod push;
pub mod subscription;

pub use channel::MessageChannel;
pub use directory::ProfileDirectory;
pub use identity::IdentityProvider;
pub use memory::{MemoryBackend, MemoryConnection};
pub use push::PushGateway;
pub use subscription::Subscription;
