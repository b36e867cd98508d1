//! FIFO hand-off between event producers and the playback worker.
//!
//! Any number of [`QueueHandle`] clones push messages; one
//! [`MessageReceiver`] pulls them. The queue counts items that were
//! enqueued but not yet finished, so depth includes the message that is
//! currently rendering or playing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

pub fn message_queue() -> (QueueHandle, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let outstanding = Arc::new(AtomicUsize::new(0));
    (
        QueueHandle {
            tx,
            outstanding: outstanding.clone(),
        },
        MessageReceiver { rx, outstanding },
    )
}

#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<String>,
    outstanding: Arc<AtomicUsize>,
}

impl QueueHandle {
    /// Add a message. Never blocks; `false` once the worker is gone.
    pub fn enqueue(&self, message: impl Into<String>) -> bool {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        match self.tx.send(message.into()) {
            Ok(()) => {
                debug!("Added message to queue. Queue size: {}", self.len());
                true
            }
            Err(_) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dequeued message. Dropping it marks the item done.
pub struct Ticket {
    pub text: String,
    outstanding: Arc<AtomicUsize>,
}

impl Ticket {
    /// Outstanding items, this one included.
    pub fn queue_len(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn done(self) {}
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

pub enum Dequeue {
    Message(Ticket),
    /// Nothing arrived within the wait.
    Timeout,
    /// Every producer is gone and the queue is drained.
    Closed,
}

pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<String>,
    outstanding: Arc<AtomicUsize>,
}

impl MessageReceiver {
    /// Wait up to `wait` for the next message.
    pub async fn next(&mut self, wait: Duration) -> Dequeue {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(text)) => Dequeue::Message(Ticket {
                text,
                outstanding: self.outstanding.clone(),
            }),
            Ok(None) => Dequeue::Closed,
            Err(_) => Dequeue::Timeout,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}
