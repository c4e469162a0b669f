use switchboard_core::ChannelId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Channel {channel} is bound to {bound}, requested as {requested}")]
    TypeBindingConflict {
        channel: ChannelId,
        bound: &'static str,
        requested: &'static str,
    },

    #[error("Receiver is in callback mode")]
    CallbackModeActive,

    #[error("A callback is already registered on this receiver")]
    CallbackAlreadyRegistered,

    #[error("No callback is registered on this receiver")]
    NoActiveCallback,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] switchboard_core::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn binding_conflict(
        channel: &ChannelId,
        bound: &'static str,
        requested: &'static str,
    ) -> Self {
        Self::TypeBindingConflict {
            channel: channel.clone(),
            bound,
            requested,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
