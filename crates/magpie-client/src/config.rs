//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration.

use std::path::PathBuf;

use magpie_shared::constants::DEFAULT_HANDLE_ATTEMPTS;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Attempts at generating an unclaimed handle before switching to a
    /// suffixed candidate.
    /// Env: `MAGPIE_HANDLE_ATTEMPTS`
    /// Default: `16`
    pub handle_attempts: u32,

    /// Attempts at flipping read flags when a conversation opens; after
    /// that the flip waits for the next open.
    /// Env: `MAGPIE_MARK_READ_ATTEMPTS`
    /// Default: `3`
    pub mark_read_attempts: u32,

    /// Capacity of the broadcast channel carrying
    /// [`ClientEvent`](crate::events::ClientEvent)s.
    /// Env: `MAGPIE_EVENT_CAPACITY`
    /// Default: `256`
    pub event_capacity: usize,

    /// Override for the on-disk cache location. When unset the platform
    /// data directory is used.
    /// Env: `MAGPIE_DATA_DIR`
    /// Default: unset
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handle_attempts: DEFAULT_HANDLE_ATTEMPTS,
            mark_read_attempts: 3,
            event_capacity: 256,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MAGPIE_HANDLE_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) => config.handle_attempts = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid MAGPIE_HANDLE_ATTEMPTS, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("MAGPIE_MARK_READ_ATTEMPTS") {
            if let Ok(n) = val.parse::<u32>() {
                config.mark_read_attempts = n;
            }
        }

        if let Ok(val) = std::env::var("MAGPIE_EVENT_CAPACITY") {
            if let Ok(n) = val.parse::<usize>() {
                if n > 0 {
                    config.event_capacity = n;
                }
            }
        }

        if let Ok(path) = std::env::var("MAGPIE_DATA_DIR") {
            if !path.is_empty() {
                config.data_dir = Some(PathBuf::from(path));
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
