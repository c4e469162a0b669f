use serde::{de::DeserializeOwned, Serialize};
use switchboard_core::TypeRegistry;

use crate::error::Result;

pub mod bincode;

pub use self::bincode::BincodeCodec;

/// Codec trait for serializing and deserializing messages
pub trait Codec: Send + Sync {
    /// Encode a value into bytes
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes into a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Registers a [`Codec`] as the wire serializer and deserializer of `T`
pub trait RegisterCodec {
    fn register_codec<T, C>(&mut self, codec: C)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        C: Codec + Clone + 'static;
}

impl RegisterCodec for TypeRegistry {
    fn register_codec<T, C>(&mut self, codec: C)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        C: Codec + Clone + 'static,
    {
        let encoder = codec.clone();
        self.register_serializer::<T, _, _, _>(
            move |value: T| -> switchboard_core::Result<Vec<u8>> {
                encoder
                    .encode(&value)
                    .map_err(switchboard_core::Error::codec)
            },
        );
        self.register_deserializer::<T, _, _, _>(
            move |bytes: Vec<u8>| -> switchboard_core::Result<T> {
                codec.decode(&bytes).map_err(switchboard_core::Error::codec)
            },
        );
    }
}
