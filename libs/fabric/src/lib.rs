//! Switchboard Fabric - typed endpoints over pluggable transports
//!
//! Provides the [`IoManager`] connection registry, the [`Sender`]/[`Receiver`]
//! endpoint model, in-process queue and TCP transports, and codec support
//! (bincode) for the network path.
//!
//! # Example
//!
//! ```no_run
//! use switchboard_fabric::{ChannelId, FabricConfig, IoManager, Receiver, Sender};
//! use switchboard_fabric::codec::{BincodeCodec, RegisterCodec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let telemetry = ChannelId::new("sensor", "thermo", "");
//! let config = FabricConfig::default().route(telemetry.clone(), "127.0.0.1:9000".parse()?);
//! let manager = IoManager::new(config)?;
//! manager.with_types(|types| types.register_codec::<f64, _>(BincodeCodec));
//!
//! // Routed channel: framed TCP
//! let receiver = manager.get_receiver::<f64>(&telemetry).await?;
//! let sender = manager.get_sender::<f64>(&telemetry).await?;
//! sender.send(21.5).await;
//! let reading = receiver.receive().await?;
//!
//! // Anything else: in-process queue
//! let local = ChannelId::new("sensor", "thermo", "local");
//! manager.get_sender::<String>(&local).await?.send("hello".into()).await;
//! # let _ = reading;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod iomanager;
pub mod resolver;
pub mod transport;

// Re-exports for convenience
pub use config::{ChannelRoute, FabricConfig};
pub use endpoint::{Callback, Endpoint, Receiver, Sender, TransportKind};
pub use error::{Error, Result};
pub use iomanager::{ChannelRemoval, IoManager};
pub use resolver::{StaticResolver, TransportResolver};
pub use switchboard_core::{ChannelId, TypeRegistry, TypedCallable};
