use crate::error::Result;

pub mod queue;
pub mod tcp;

pub use self::queue::{Queue, QueueRegistry};
pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};

/// Largest frame accepted by default (100 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 100 * 1024 * 1024;

/// Transport trait for sending and receiving raw bytes
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}
