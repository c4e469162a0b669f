use std::any::type_name;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchboard_core::{ChannelId, TypedCallable};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, trace, warn};

use crate::endpoint::delivery::{Delivery, Inbound};
use crate::endpoint::{Callback, Endpoint, Receiver, Sender, TransportKind};
use crate::error::{Error, Result};
use crate::transport::{Queue, TcpTransport, TcpTransportListener, Transport};

/// Pause after a failed accept, e.g. while out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Connection settings shared by network endpoints
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub max_frame_bytes: usize,
    /// Frames buffered on the receiving side before peers are back-pressured
    pub buffer_capacity: usize,
    pub poll_interval: Duration,
}

/// Sender serializing values onto a TCP link
///
/// The link is opened on the first send and reopened on the next send after
/// any failure.
pub struct NetworkSender<T> {
    channel: ChannelId,
    address: SocketAddr,
    serializer: TypedCallable,
    settings: LinkSettings,
    link: tokio::sync::Mutex<Option<TcpTransport>>,
    _payload: PhantomData<fn(T)>,
}

impl<T: Send + 'static> NetworkSender<T> {
    /// `serializer` must have the `Fn(T) -> Result<Vec<u8>>` wire shape
    pub fn new(
        channel: ChannelId,
        address: SocketAddr,
        serializer: TypedCallable,
        settings: LinkSettings,
    ) -> Self {
        debug!(
            channel = %channel,
            address = %address,
            payload = type_name::<T>(),
            "Network sender created"
        );
        Self {
            channel,
            address,
            serializer,
            settings,
            link: tokio::sync::Mutex::new(None),
            _payload: PhantomData,
        }
    }

    async fn connect(&self) -> Result<TcpTransport> {
        let transport = TcpTransport::builder()
            .address(self.address)
            .connect_timeout(self.settings.connect_timeout)
            .send_timeout(self.settings.send_timeout)
            .max_frame_bytes(self.settings.max_frame_bytes)
            .connect()
            .await?;
        debug!(channel = %self.channel, address = %self.address, "Network link connected");
        Ok(transport)
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Endpoint for NetworkSender<T> {
    fn channel(&self) -> &ChannelId {
        &self.channel
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Network {
            address: self.address,
        }
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }

    async fn close(&self) {
        if let Some(mut transport) = self.link.lock().await.take() {
            let _ = transport.close().await;
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Sender<T> for NetworkSender<T> {
    async fn send(&self, value: T) -> bool {
        let bytes = match self
            .serializer
            .invoke::<(T,), switchboard_core::Result<Vec<u8>>>((value,))
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) | Err(e) => {
                warn!(channel = %self.channel, error = %e, "Serialization failed");
                return false;
            }
        };

        let mut link = self.link.lock().await;
        if link.is_none() {
            match self.connect().await {
                Ok(transport) => *link = Some(transport),
                Err(e) => {
                    debug!(channel = %self.channel, address = %self.address, error = %e, "Peer unavailable");
                    return false;
                }
            }
        }

        let Some(transport) = link.as_mut() else {
            return false;
        };
        match transport.send(&bytes).await {
            Ok(()) => true,
            Err(e) => {
                debug!(channel = %self.channel, error = %e, "Network send failed, dropping link");
                *link = None;
                false
            }
        }
    }
}

struct FrameInbound<T> {
    frames: Queue<Vec<u8>>,
    deserializer: TypedCallable,
    _payload: PhantomData<fn() -> T>,
}

#[async_trait::async_trait]
impl<T: Send + 'static> Inbound<T> for FrameInbound<T> {
    async fn next(&self) -> Result<T> {
        let bytes = self.frames.pop().await.ok_or(Error::ConnectionClosed)?;
        let value = self
            .deserializer
            .invoke::<(Vec<u8>,), switchboard_core::Result<T>>((bytes,))??;
        Ok(value)
    }
}

/// Receiver listening for framed values from any number of peers
pub struct NetworkReceiver<T> {
    channel: ChannelId,
    local_addr: SocketAddr,
    delivery: Delivery<T>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> NetworkReceiver<T> {
    /// Bind to `address` and start accepting peers
    ///
    /// `deserializer` must have the `Fn(Vec<u8>) -> Result<T>` wire shape.
    pub async fn bind(
        channel: ChannelId,
        address: SocketAddr,
        deserializer: TypedCallable,
        settings: LinkSettings,
    ) -> Result<Self> {
        let listener = TcpTransportListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        let frames = Queue::new(settings.buffer_capacity);

        let acceptor = tokio::spawn(accept_loop(
            channel.clone(),
            listener,
            frames.clone(),
            settings.max_frame_bytes,
        ));

        let inbound = FrameInbound {
            frames,
            deserializer,
            _payload: PhantomData,
        };

        debug!(
            channel = %channel,
            address = %local_addr,
            payload = type_name::<T>(),
            "Network receiver listening"
        );

        Ok(Self {
            delivery: Delivery::new(channel.clone(), Arc::new(inbound), settings.poll_interval),
            channel,
            local_addr,
            acceptor: Mutex::new(Some(acceptor)),
        })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl<T> Drop for NetworkReceiver<T> {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.get_mut().take() {
            acceptor.abort();
        }
    }
}

async fn accept_loop(
    channel: ChannelId,
    listener: TcpTransportListener,
    frames: Queue<Vec<u8>>,
    max_frame_bytes: usize,
) {
    // Readers die with this set when the acceptor is aborted
    let mut readers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((transport, peer)) => {
                    trace!(channel = %channel, peer = %peer, "Peer connected");
                    readers.spawn(read_frames(
                        channel.clone(),
                        transport.with_max_frame_bytes(max_frame_bytes),
                        frames.clone(),
                    ));
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = readers.join_next(), if !readers.is_empty() => {}
        }
    }
}

async fn read_frames(channel: ChannelId, mut transport: TcpTransport, frames: Queue<Vec<u8>>) {
    loop {
        match transport.receive().await {
            Ok(bytes) => {
                if !frames.push_wait(bytes).await {
                    break;
                }
            }
            Err(Error::ConnectionClosed) => {
                trace!(channel = %channel, "Peer disconnected");
                break;
            }
            Err(e) => {
                debug!(channel = %channel, error = %e, "Dropping peer");
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Endpoint for NetworkReceiver<T> {
    fn channel(&self) -> &ChannelId {
        &self.channel
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Network {
            address: self.local_addr,
        }
    }

    fn payload_type(&self) -> &'static str {
        type_name::<T>()
    }

    async fn close(&self) {
        self.delivery.close().await;
        let acceptor = self.acceptor.lock().take();
        if let Some(acceptor) = acceptor {
            acceptor.abort();
            let _ = acceptor.await;
            debug!(channel = %self.channel, "Network receiver closed");
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Receiver<T> for NetworkReceiver<T> {
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
