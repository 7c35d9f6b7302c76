//! Buffer of received radio messages
//!
//! Messages are consumed most-recent-first. The "has data" signal is set on
//! every push and cleared exactly when the buffer becomes empty.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use crate::frame::RadioMessage;

/// Shared inbox of received messages
#[derive(Debug, Clone)]
pub struct Inbox {
    inner: Arc<InboxInner>,
}

#[derive(Debug)]
struct InboxInner {
    messages: Mutex<Vec<RadioMessage>>,
    signal: watch::Sender<bool>,
}

impl Inbox {
    /// Create an empty inbox
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            inner: Arc::new(InboxInner {
                messages: Mutex::new(Vec::new()),
                signal,
            }),
        }
    }

    /// Store a message and raise the signal
    pub fn push(&self, message: RadioMessage) {
        let mut messages = self.inner.messages.lock();
        messages.push(message);
        self.inner.signal.send_replace(true);
    }

    /// Remove the most recently pushed message
    pub fn pop(&self) -> Option<RadioMessage> {
        let mut messages = self.inner.messages.lock();
        let message = messages.pop();
        if messages.is_empty() {
            self.inner.signal.send_replace(false);
        }
        message
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.inner.messages.lock().len()
    }

    /// Whether the inbox is empty
    pub fn is_empty(&self) -> bool {
        self.inner.messages.lock().is_empty()
    }

    /// Current state of the "has data" signal
    pub fn has_data(&self) -> bool {
        *self.inner.signal.borrow()
    }

    /// Wait until the "has data" signal is set
    pub async fn wait(&self) {
        let mut rx = self.inner.signal.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|has_data| *has_data).await;
    }

    /// Subscribe to signal changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.signal.subscribe()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}
