//! Explicit wiring of the client's collaborators.

use std::sync::Arc;

use magpie_backend::{
    IdentityProvider, MemoryBackend, MemoryConnection, MessageChannel, ProfileDirectory,
    PushGateway,
};
use magpie_store::Database;

/// Everything the client talks to, passed explicitly instead of reached
/// through globals.
///
/// The collaborators are trait objects so tests and the demo can run
/// entirely against the in-memory backend while a deployment wires real
/// services.
pub struct AppContext {
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: Arc<dyn ProfileDirectory>,
    pub channel: Arc<dyn MessageChannel>,
    pub push: Arc<dyn PushGateway>,
    pub store: Arc<Database>,
}

impl AppContext {
    /// Wire one connection of the in-memory backend into every seam.
    pub fn in_memory(backend: &Arc<MemoryBackend>, store: Database) -> Self {
        let connection: Arc<MemoryConnection> = MemoryConnection::open(backend);
        Self {
            identity: connection.clone(),
            directory: connection.clone(),
            channel: connection.clone(),
            push: connection,
            store: Arc::new(store),
        }
    }
}
