use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

use replybot_types::notification::NotificationPayload;

/// Messages travelling from the HTTP side to the worker.
#[derive(Debug)]
pub enum QueueMessage {
    Notification(NotificationPayload),
    /// Poison value: the worker stops when it dequeues this. Anything queued
    /// before it is still processed.
    Shutdown,
}

#[derive(Debug, Error)]
#[error("notification queue is closed")]
pub struct QueueClosed;

/// Producer handle of the unbounded FIFO notification queue.
///
/// Cloneable; every clone feeds the same single consumer.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    tx: mpsc::UnboundedSender<QueueMessage>,
    /// Items enqueued and not yet dequeued, shutdown markers included.
    depth: Arc<AtomicUsize>,
}

/// Consumer half, owned by the worker.
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<QueueMessage>,
    depth: Arc<AtomicUsize>,
}

impl NotificationQueue {
    pub fn new() -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let queue = Self {
            inner: Arc::new(QueueInner {
                tx,
                depth: depth.clone(),
            }),
        };
        (queue, NotificationReceiver { rx, depth })
    }

    /// Append a payload. Never blocks; fails only once the worker is gone.
    pub fn enqueue(&self, payload: NotificationPayload) -> Result<(), QueueClosed> {
        self.push(QueueMessage::Notification(payload))
    }

    /// Ask the worker to stop after draining everything queued so far.
    pub fn shutdown(&self) -> Result<(), QueueClosed> {
        self.push(QueueMessage::Shutdown)
    }

    pub fn len(&self) -> usize {
        self.inner.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, message: QueueMessage) -> Result<(), QueueClosed> {
        // Count first so a fast consumer never drives the depth below zero.
        self.inner.depth.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send(message).map_err(|_| {
            self.inner.depth.fetch_sub(1, Ordering::SeqCst);
            QueueClosed
        })
    }
}

impl NotificationReceiver {
    /// Wait for the next message. `None` once every producer handle is
    /// dropped and the buffer is empty.
    pub async fn dequeue(&mut self) -> Option<QueueMessage> {
        let message = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
