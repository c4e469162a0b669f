//! Sender/receiver endpoints
//!
//! Every endpoint is bound to one [`ChannelId`] and one [`TransportKind`] when
//! it is built. Callers only see the payload-typed [`Sender`] and [`Receiver`]
//! traits; the registry also keeps an untyped [`Endpoint`] view of each one for
//! bookkeeping and teardown.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use switchboard_core::ChannelId;

use crate::error::Result;

mod delivery;
pub mod network;
pub mod queue;

pub use self::network::{NetworkReceiver, NetworkSender};
pub use self::queue::{QueueReceiver, QueueSender};

/// Function invoked by a receiver in callback mode, once per item
pub type Callback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Transport an endpoint is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Bounded in-process queue
    Queue,
    /// Framed TCP link to/from `address`
    Network { address: SocketAddr },
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => f.write_str("queue"),
            Self::Network { address } => write!(f, "network({})", address),
        }
    }
}

/// Untyped view shared by every endpoint
#[async_trait::async_trait]
pub trait Endpoint: Send + Sync {
    fn channel(&self) -> &ChannelId;

    fn transport(&self) -> TransportKind;

    /// Name of the payload type the endpoint was created for
    fn payload_type(&self) -> &'static str;

    /// Release transport resources
    ///
    /// Receivers stop any active callback loop before anything else is torn
    /// down; reads pending on or issued after a closed receiver fail with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed), and a
    /// closed queue sender reports `false`. Closing twice is harmless.
    async fn close(&self);
}

/// Sending half of a channel
#[async_trait::async_trait]
pub trait Sender<T: Send + 'static>: Endpoint {
    /// Hand `value` to the transport
    ///
    /// Returns `false` when the transport cannot take it right now (full
    /// buffer, unreachable peer). The value is dropped in that case.
    async fn send(&self, value: T) -> bool;
}

/// Receiving half of a channel
#[async_trait::async_trait]
pub trait Receiver<T: Send + 'static>: Endpoint {
    /// Wait for the next item
    ///
    /// Fails with [`Error::CallbackModeActive`](crate::Error::CallbackModeActive)
    /// while a callback owns delivery, including when the callback is added
    /// while this read is waiting.
    async fn receive(&self) -> Result<T>;

    /// Wait at most `timeout` for the next item; `Ok(None)` on expiry
    async fn try_receive(&self, timeout: Duration) -> Result<Option<T>>;

    /// Switch to push mode: a dedicated task calls `callback` for every item
    /// until [`remove_callback`](Receiver::remove_callback)
    fn add_callback(&self, callback: Callback<T>) -> Result<()>;

    /// Stop the delivery task and wait for it to exit
    ///
    /// After this returns the callback is never invoked again. Fails with
    /// [`Error::NoActiveCallback`](crate::Error::NoActiveCallback) when there
    /// is nothing to stop.
    async fn remove_callback(&self) -> Result<()>;

    fn has_callback(&self) -> bool;
}
