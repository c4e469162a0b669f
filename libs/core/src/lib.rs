//! Switchboard Core - transport-free building blocks
//!
//! Channel identities, type-erased callables and the per-type codec
//! registry shared by every endpoint.

pub mod callable;
pub mod error;
pub mod identity;
pub mod serdes;

pub use callable::{ArgList, DynValue, IntoCallable, Signature, TypedCallable};
pub use error::{CodecRole, Error, Result};
pub use identity::ChannelId;
pub use serdes::TypeRegistry;
