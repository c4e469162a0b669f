//! Connection registry
//!
//! [`IoManager`] hands out typed endpoints for a [`ChannelId`], creating each
//! one on first request and returning the same instance afterwards. It owns
//! the [`TypeRegistry`] used by network endpoints and every endpoint it
//! created.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use switchboard_core::{ChannelId, TypeRegistry};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::debug;

use crate::config::FabricConfig;
use crate::endpoint::{
    Endpoint, NetworkReceiver, NetworkSender, QueueReceiver, QueueSender, Receiver, Sender,
    TransportKind,
};
use crate::error::{Error, Result};
use crate::resolver::{StaticResolver, TransportResolver};
use crate::transport::QueueRegistry;

/// What [`IoManager::remove_channel`] found and tore down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelRemoval {
    pub sender: bool,
    pub receiver: bool,
}

impl ChannelRemoval {
    /// Neither direction had been created for the channel
    pub fn is_absent(&self) -> bool {
        !self.sender && !self.receiver
    }
}

/// One cached endpoint with the payload type it was created for
struct EndpointEntry {
    type_id: TypeId,
    type_name: &'static str,
    /// `Arc<dyn Sender<T>>` or `Arc<dyn Receiver<T>>`
    handle: Box<dyn Any + Send + Sync>,
    endpoint: Arc<dyn Endpoint>,
}

impl EndpointEntry {
    fn sender<T: Send + 'static>(endpoint: Arc<impl Sender<T> + 'static>) -> Self {
        let handle: Arc<dyn Sender<T>> = endpoint.clone();
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            handle: Box::new(handle),
            endpoint,
        }
    }

    fn receiver<T: Send + 'static>(endpoint: Arc<impl Receiver<T> + 'static>) -> Self {
        let handle: Arc<dyn Receiver<T>> = endpoint.clone();
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            handle: Box::new(handle),
            endpoint,
        }
    }

    /// Typed handle, provided `T` is the payload type the entry was built for
    fn handle<T: 'static, H: Clone + 'static>(&self, channel: &ChannelId) -> Result<H> {
        let conflict = || Error::binding_conflict(channel, self.type_name, type_name::<T>());
        if self.type_id != TypeId::of::<T>() {
            return Err(conflict());
        }
        self.handle.downcast_ref::<H>().cloned().ok_or_else(conflict)
    }
}

type EndpointMap = AsyncRwLock<HashMap<ChannelId, EndpointEntry>>;

/// Process-wide factory and cache of endpoints
///
/// Not `Clone`: share it behind an `Arc`.
pub struct IoManager {
    config: FabricConfig,
    resolver: Box<dyn TransportResolver>,
    types: RwLock<TypeRegistry>,
    queues: QueueRegistry,
    senders: EndpointMap,
    receivers: EndpointMap,
}

impl IoManager {
    /// Registry routing channels by the config's `channels` table
    pub fn new(config: FabricConfig) -> Result<Self> {
        let resolver = StaticResolver::from(&config);
        Self::with_resolver(config, resolver)
    }

    /// Registry with an injected transport policy
    pub fn with_resolver(
        config: FabricConfig,
        resolver: impl TransportResolver + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Box::new(resolver)))
    }

    fn build(config: FabricConfig, resolver: Box<dyn TransportResolver>) -> Self {
        Self {
            queues: QueueRegistry::new(config.queue_capacity),
            config,
            resolver,
            types: RwLock::new(TypeRegistry::new()),
            senders: AsyncRwLock::new(HashMap::new()),
            receivers: AsyncRwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    /// Mutate the type registry, typically once during startup
    pub fn with_types<R>(&self, f: impl FnOnce(&mut TypeRegistry) -> R) -> R {
        f(&mut self.types.write())
    }

    pub fn types(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.types.read()
    }

    /// Sender for `channel`, created on first request
    ///
    /// Fails with [`Error::TypeBindingConflict`] when the channel already has
    /// a sender for another payload type, and with an unregistered-type error
    /// when a network sender is needed and `T` has no wire serializer.
    pub async fn get_sender<T: Send + 'static>(
        &self,
        channel: &ChannelId,
    ) -> Result<Arc<dyn Sender<T>>> {
        if let Some(entry) = self.senders.read().await.get(channel) {
            return entry.handle::<T, Arc<dyn Sender<T>>>(channel);
        }

        let mut senders = self.senders.write().await;
        if let Some(entry) = senders.get(channel) {
            return entry.handle::<T, Arc<dyn Sender<T>>>(channel);
        }

        let entry = self.create_sender::<T>(channel)?;
        let handle = entry.handle::<T, Arc<dyn Sender<T>>>(channel)?;
        senders.insert(channel.clone(), entry);
        Ok(handle)
    }

    /// Receiver for `channel`, created on first request
    pub async fn get_receiver<T: Send + 'static>(
        &self,
        channel: &ChannelId,
    ) -> Result<Arc<dyn Receiver<T>>> {
        if let Some(entry) = self.receivers.read().await.get(channel) {
            return entry.handle::<T, Arc<dyn Receiver<T>>>(channel);
        }

        let mut receivers = self.receivers.write().await;
        if let Some(entry) = receivers.get(channel) {
            return entry.handle::<T, Arc<dyn Receiver<T>>>(channel);
        }

        let entry = self.create_receiver::<T>(channel).await?;
        let handle = entry.handle::<T, Arc<dyn Receiver<T>>>(channel)?;
        receivers.insert(channel.clone(), entry);
        Ok(handle)
    }

    fn create_sender<T: Send + 'static>(&self, channel: &ChannelId) -> Result<EndpointEntry> {
        let transport = self.resolver.resolve(channel);
        debug!(channel = %channel, transport = %transport, "Creating sender");

        let entry = match transport {
            TransportKind::Queue => {
                let queue = self.queues.get_or_create::<T>(channel)?;
                EndpointEntry::sender(Arc::new(QueueSender::new(
                    channel.clone(),
                    queue,
                    self.config.send_timeout(),
                )))
            }
            TransportKind::Network { address } => {
                let serializer = self.types.read().wire_serializer::<T>()?;
                EndpointEntry::sender(Arc::new(NetworkSender::<T>::new(
                    channel.clone(),
                    address,
                    serializer,
                    self.config.link_settings(),
                )))
            }
        };
        Ok(entry)
    }

    async fn create_receiver<T: Send + 'static>(
        &self,
        channel: &ChannelId,
    ) -> Result<EndpointEntry> {
        let transport = self.resolver.resolve(channel);
        debug!(channel = %channel, transport = %transport, "Creating receiver");

        let entry = match transport {
            TransportKind::Queue => {
                let queue = self.queues.get_or_create::<T>(channel)?;
                EndpointEntry::receiver(Arc::new(QueueReceiver::new(
                    channel.clone(),
                    queue,
                    self.config.callback_poll(),
                )))
            }
            TransportKind::Network { address } => {
                let deserializer = self.types.read().wire_deserializer::<T>()?;
                let receiver = NetworkReceiver::<T>::bind(
                    channel.clone(),
                    address,
                    deserializer,
                    self.config.link_settings(),
                )
                .await?;
                EndpointEntry::receiver(Arc::new(receiver))
            }
        };
        Ok(entry)
    }

    /// Tear down both endpoints of `channel`
    ///
    /// An active receive callback is stopped and joined before any transport
    /// resource is released. Removing a channel that was never created is a
    /// no-op reported through [`ChannelRemoval::is_absent`].
    pub async fn remove_channel(&self, channel: &ChannelId) -> ChannelRemoval {
        let receiver = self.receivers.write().await.remove(channel);
        let sender = self.senders.write().await.remove(channel);

        let removal = ChannelRemoval {
            sender: sender.is_some(),
            receiver: receiver.is_some(),
        };

        if let Some(entry) = receiver {
            entry.endpoint.close().await;
        }
        if let Some(entry) = sender {
            entry.endpoint.close().await;
        }
        self.queues.remove(channel);

        debug!(
            channel = %channel,
            sender = removal.sender,
            receiver = removal.receiver,
            "Channel removed"
        );
        removal
    }

    /// Stop every callback loop, close every endpoint and forget them all
    pub async fn shutdown(&self) {
        let receivers: Vec<_> = self.receivers.write().await.drain().collect();
        let senders: Vec<_> = self.senders.write().await.drain().collect();

        for (_, entry) in receivers {
            entry.endpoint.close().await;
        }
        for (_, entry) in senders {
            entry.endpoint.close().await;
        }
        self.queues.clear();

        debug!("IoManager shut down");
    }

    pub async fn contains_sender(&self, channel: &ChannelId) -> bool {
        self.senders.read().await.contains_key(channel)
    }

    pub async fn contains_receiver(&self, channel: &ChannelId) -> bool {
        self.receivers.read().await.contains_key(channel)
    }

    pub async fn sender_count(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn receiver_count(&self) -> usize {
        self.receivers.read().await.len()
    }
}

impl Default for IoManager {
    /// Every channel on in-process queues, default settings
    fn default() -> Self {
        // Default settings always pass validation
        Self::build(FabricConfig::default(), Box::new(StaticResolver::new()))
    }
}
