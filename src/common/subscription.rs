//! Single-subscriber event fan-in.
//!
//! Event sources publish into an [`EventHub`]; the relay subscribes to get a
//! receiver and unsubscribes on shutdown, which ends that receiver.

use std::sync::Mutex;

use tokio::sync::mpsc;

/// Holds the sender of the current subscriber, if any.
#[derive(Debug)]
pub struct EventHub<T> {
    subscriber: Mutex<Option<mpsc::UnboundedSender<T>>>,
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self {
            subscriber: Mutex::new(None),
        }
    }
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. A previous subscriber's stream ends.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.lock() = Some(tx);
        rx
    }

    /// Drop the subscriber. Its receiver yields the queued items, then `None`.
    pub fn unsubscribe(&self) {
        self.lock().take();
    }

    /// Deliver `item` to the subscriber.
    ///
    /// Returns `false` when nobody is subscribed and the item was dropped.
    pub fn publish(&self, item: T) -> bool {
        let mut subscriber = self.lock();
        let Some(tx) = subscriber.as_ref() else {
            return false;
        };
        if tx.send(item).is_err() {
            // Receiver went away without unsubscribing.
            subscriber.take();
            return false;
        }
        true
    }

    pub fn has_subscriber(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<T>>> {
        self.subscriber.lock().unwrap_or_else(|e| e.into_inner())
    }
}
