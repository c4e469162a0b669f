use std::any::type_name;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use switchboard_core::ChannelId;
use tracing::debug;

use crate::endpoint::delivery::{Delivery, Inbound};
use crate::endpoint::{Callback, Endpoint, Receiver, Sender, TransportKind};
use crate::error::{Error, Result};
use crate::transport::Queue;

/// Sender writing into the in-process queue of its channel
pub struct QueueSender<T> {
    channel: ChannelId,
    queue: Queue<T>,
    send_timeout: Duration,
    closed: AtomicBool,
}

impl<T: Send + 'static> QueueSender<T> {
    pub fn new(channel: ChannelId, queue: Queue<T>, send_timeout: Duration) -> Self {
        debug!(
            channel = %channel,
            payload = type_name::<T>(),
            capacity = queue.capacity(),
            "Queue sender created"
        );
        Self {
            channel,
            queue,
            send_timeout,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Endpoint for QueueSender<T> {
    fn channel(&self) -> &ChannelId {
        &self.channel
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Queue
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Sender<T> for QueueSender<T> {
    async fn send(&self, value: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.queue.push(value, self.send_timeout).await
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Inbound<T> for Queue<T> {
    async fn next(&self) -> Result<T> {
        self.pop().await.ok_or(Error::ConnectionClosed)
    }
}

/// Receiver reading from the in-process queue of its channel
pub struct QueueReceiver<T> {
    channel: ChannelId,
    delivery: Delivery<T>,
}

impl<T: Send + 'static> QueueReceiver<T> {
    pub fn new(channel: ChannelId, queue: Queue<T>, poll_interval: Duration) -> Self {
        debug!(channel = %channel, payload = type_name::<T>(), "Queue receiver created");
        Self {
            delivery: Delivery::new(channel.clone(), Arc::new(queue), poll_interval),
            channel,
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Endpoint for QueueReceiver<T> {
    fn channel(&self) -> &ChannelId {
        &self.channel
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Queue
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }

    async fn close(&self) {
        self.delivery.close().await;
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Receiver<T> for QueueReceiver<T> {
    async fn receive(&self) -> Result<T> {
        self.delivery.receive().await
    }

    async fn try_receive(&self, timeout: Duration) -> Result<Option<T>> {
        self.delivery.try_receive(timeout).await
    }

    fn add_callback(&self, callback: Callback<T>) -> Result<()> {
        self.delivery.start(callback)
    }

    async fn remove_callback(&self) -> Result<()> {
        self.delivery.stop().await
    }

    fn has_callback(&self) -> bool {
        self.delivery.is_active()
    }
}
