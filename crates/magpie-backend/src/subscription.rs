//! Live feed handles.
//!
//! A [`Subscription`] wraps a `tokio::sync::watch` receiver: the backend
//! stores the latest full state and every change overwrites it, so a slow
//! consumer only ever observes the most recent snapshot. Dropping the handle
//! releases the backend-side subscriber on every exit path.

use tokio::sync::watch;

use magpie_shared::ChannelError;

/// RAII handle on a live feed.
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    primed: bool,
}

impl<T: Clone> Subscription<T> {
    pub fn new(rx: watch::Receiver<T>) -> Self {
        Self { rx, primed: false }
    }

    /// Next delivery. The first call yields the value current at subscribe
    /// time; each later call waits for a change. Intermediate states may be
    /// coalesced; every delivery is authoritative on its own.
    pub async fn recv(&mut self) -> Result<T, ChannelError> {
        if self.primed {
            self.rx
                .changed()
                .await
                .map_err(|_| ChannelError::Closed)?;
        } else {
            self.primed = true;
        }
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Latest value without waiting.
    pub fn latest(&self) -> T {
        self.rx.borrow().clone()
    }
}
