use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchboard_core::ChannelId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::error::{Error, Result};

/// Bounded in-process FIFO shared by the sender and receiver of one channel
///
/// Items come out in push order. Pops are serialized, so any number of tasks
/// may hold a clone, but each item is delivered exactly once.
pub struct Queue<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
    capacity: usize,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
            capacity: self.capacity,
        }
    }
}

impl<T: Send + 'static> Queue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            capacity,
        }
    }

    /// Push without waiting longer than `timeout` for free space
    ///
    /// Returns `false` when the queue stayed full.
    pub async fn push(&self, value: T, timeout: Duration) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(value)) if !timeout.is_zero() => {
                matches!(
                    tokio::time::timeout(timeout, self.tx.send(value)).await,
                    Ok(Ok(()))
                )
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Push, waiting as long as it takes for free space
    pub async fn push_wait(&self, value: T) -> bool {
        self.tx.send(value).await.is_ok()
    }

    /// Wait for the next item
    pub async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Wait at most `timeout` for the next item
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.pop())
            .await
            .ok()
            .flatten()
    }

    /// Number of items currently buffered
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct QueueSlot {
    type_name: &'static str,
    queue: Box<dyn Any + Send + Sync>,
}

/// Per-channel queues, created on first use and bound to one payload type
pub struct QueueRegistry {
    capacity: usize,
    queues: Mutex<HashMap<ChannelId, QueueSlot>>,
}

impl QueueRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Queue for `channel`, created with the registry capacity if absent
    pub fn get_or_create<T: Send + 'static>(&self, channel: &ChannelId) -> Result<Queue<T>> {
        let mut queues = self.queues.lock();
        let slot = queues.entry(channel.clone()).or_insert_with(|| {
            trace!(channel = %channel, payload = type_name::<T>(), "Creating queue");
            QueueSlot {
                type_name: type_name::<T>(),
                queue: Box::new(Queue::<T>::new(self.capacity)),
            }
        });

        slot.queue
            .downcast_ref::<Queue<T>>()
            .cloned()
            .ok_or_else(|| Error::binding_conflict(channel, slot.type_name, type_name::<T>()))
    }

    /// Drop the registry's reference to the queue of `channel`
    pub fn remove(&self, channel: &ChannelId) -> bool {
        self.queues.lock().remove(channel).is_some()
    }

    pub fn clear(&self) {
        self.queues.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
